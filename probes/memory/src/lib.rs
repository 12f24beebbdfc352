//! Remote memory monitoring for snmpcheck-rs.
//!
//! This crate determines the "real" memory usage of a remote Linux host from
//! its SNMP host resources storage table (used memory with buffers and cache
//! accounted for) and turns it into a Nagios-compatible verdict.
//!
//! # Examples
//!
//! ```rust,no_run
//! use snmpcheck_rs_core::{Probe, SessionConfig, Thresholds};
//! use snmpcheck_rs_memory::{MemoryProbe, SnmpFetcher};
//!
//! // Query the agent with 85% warning and 90% critical thresholds
//! let fetcher = SnmpFetcher::connect(&SessionConfig::new("192.0.2.10"))?;
//! let mut probe = MemoryProbe::new(fetcher, Thresholds::default());
//!
//! let result = probe.check()?;
//! println!("{}", result);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod fetcher;
pub mod memory;
pub mod wire;

#[cfg(test)]
mod loopback;

pub use fetcher::{fetch_samples, CounterSource, SnmpFetcher, StorageOid, ROUND_TRIPS};
pub use memory::{check_host, evaluate, MemoryProbe, MemoryReading, MemorySamples, MemoryUsage, StorageSample};
