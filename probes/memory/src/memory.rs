//! Memory verdict evaluation for snmpcheck-rs.
//!
//! Turns the raw storage-table counters of a remote host into "real" memory
//! usage (used memory with buffers and cache accounted for) and compares it
//! against the warning and critical thresholds.
//!
//! Counters are assumed to be kilobytes: megabytes are `units / 1024` and
//! bytes are `units * 1024`.

use crate::fetcher::{fetch_samples, CounterSource, SnmpFetcher, ROUND_TRIPS};
use snmpcheck_rs_core::{
    format::round_half_away, CheckResult, PerfData, Probe, ProbeError, SessionConfig, Status,
    ThresholdMode, Thresholds,
};
use tokio::{task, time};
use tracing::info;

/// Raw readings for one storage-table row.
///
/// `size_units` is only fetched for the total memory row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSample {
    pub used_units: i64,
    pub size_units: Option<i64>,
}

impl StorageSample {
    #[must_use]
    pub const fn new(used_units: i64) -> Self {
        Self {
            used_units,
            size_units: None,
        }
    }

    #[must_use]
    pub const fn with_size(used_units: i64, size_units: i64) -> Self {
        Self {
            used_units,
            size_units: Some(size_units),
        }
    }
}

/// The three rows fetched from the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySamples {
    pub total: StorageSample,
    pub buffers: StorageSample,
    pub cached: StorageSample,
}

/// Memory figures derived from one set of samples.
///
/// `adjusted_used_units` may be negative or exceed `total_units` when the
/// agent reports odd data; it is never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReading {
    pub total_units: i64,
    pub adjusted_used_units: i64,
}

impl MemoryReading {
    #[must_use]
    pub const fn new(total_units: i64, adjusted_used_units: i64) -> Self {
        Self {
            total_units,
            adjusted_used_units,
        }
    }

    /// Derive a reading: `total.used + buffers.used - cached.used`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::InvalidReading`] if the total row carries no
    /// size or the sum overflows.
    pub fn from_samples(samples: &MemorySamples) -> Result<Self, ProbeError> {
        let total_units = samples
            .total
            .size_units
            .ok_or_else(|| ProbeError::invalid_reading("total memory row has no size"))?;

        let adjusted_used_units = samples
            .total
            .used_units
            .checked_add(samples.buffers.used_units)
            .and_then(|sum| sum.checked_sub(samples.cached.used_units))
            .ok_or_else(|| ProbeError::invalid_reading("used memory counters overflow"))?;

        Ok(Self::new(total_units, adjusted_used_units))
    }
}

/// Evaluated memory usage, ready for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub status: Status,
    pub percent_used: i64,
    pub free_mb: i64,
    pub total_mb: i64,
    pub free_bytes: i64,
}

impl MemoryUsage {
    /// Build the plugin result line for this usage.
    #[must_use]
    pub fn to_check_result(&self) -> CheckResult {
        CheckResult::new(
            self.status,
            format!(
                "Memory at {}% with {} of {} MB free",
                self.percent_used, self.free_mb, self.total_mb
            ),
        )
        .with_perfdata(PerfData::new("percent used", self.percent_used, "%"))
        .with_perfdata(PerfData::new("free", self.free_bytes, "B"))
    }
}

/// Compute the display figures for `reading` and decide the verdict.
///
/// In percentage mode higher usage is worse (`>=`); in absolute mode less
/// free memory is worse (`<=`). Both comparisons are inclusive and critical
/// is checked first.
///
/// # Errors
///
/// Returns [`ProbeError::InvalidReading`] if the total size is not positive.
///
/// # Examples
///
/// ```rust
/// use snmpcheck_rs_core::{Status, Thresholds};
/// use snmpcheck_rs_memory::{evaluate, MemoryReading};
///
/// let usage = evaluate(&MemoryReading::new(8_000_000, 4_200_000), &Thresholds::default())?;
/// assert_eq!(usage.percent_used, 53);
/// assert_eq!(usage.status, Status::Ok);
/// # Ok::<(), snmpcheck_rs_core::ProbeError>(())
/// ```
pub fn evaluate(reading: &MemoryReading, thresholds: &Thresholds) -> Result<MemoryUsage, ProbeError> {
    if reading.total_units <= 0 {
        return Err(ProbeError::invalid_reading(format!(
            "total memory size is {}",
            reading.total_units
        )));
    }

    let total = reading.total_units as f64;
    let used = reading.adjusted_used_units as f64;
    let free = total - used;

    let percent_used = round_half_away(used / total * 100.0);
    let free_mb = round_half_away(free / 1024.0);
    let total_mb = round_half_away(total / 1024.0);
    let free_bytes = round_half_away(free * 1024.0);

    let warning = thresholds.warning.value();
    let critical = thresholds.critical.value();
    let status = match thresholds.mode() {
        ThresholdMode::Percent => {
            Status::for_upper_thresholds(percent_used as f64, warning, critical)
        }
        ThresholdMode::AbsoluteMb => Status::for_lower_thresholds(free_mb as f64, warning, critical),
    };

    Ok(MemoryUsage {
        status,
        percent_used,
        free_mb,
        total_mb,
        free_bytes,
    })
}

/// Memory probe querying a remote agent through a [`CounterSource`].
///
/// # Examples
///
/// ```rust,no_run
/// use snmpcheck_rs_core::{Probe, SessionConfig, Thresholds};
/// use snmpcheck_rs_memory::{MemoryProbe, SnmpFetcher};
///
/// let fetcher = SnmpFetcher::connect(&SessionConfig::new("192.0.2.10"))?;
/// let mut probe = MemoryProbe::new(fetcher, Thresholds::default());
/// println!("{}", probe.check()?);
/// # Ok::<(), snmpcheck_rs_core::ProbeError>(())
/// ```
#[derive(Debug)]
pub struct MemoryProbe<S> {
    name: String,
    source: S,
    thresholds: Thresholds,
}

impl<S: CounterSource> MemoryProbe<S> {
    #[must_use]
    pub fn new(source: S, thresholds: Thresholds) -> Self {
        Self {
            name: "memory".to_owned(),
            source,
            thresholds,
        }
    }

    #[must_use]
    pub const fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Fetch counters and evaluate them without building the output line.
    pub fn usage(&mut self) -> Result<MemoryUsage, ProbeError> {
        let samples = fetch_samples(&mut self.source)?;
        let reading = MemoryReading::from_samples(&samples)?;
        evaluate(&reading, &self.thresholds)
    }
}

impl<S: CounterSource> Probe for MemoryProbe<S> {
    type Error = ProbeError;

    fn check(&mut self) -> Result<CheckResult, Self::Error> {
        let usage = self.usage()?;
        info!(
            status = %usage.status,
            percent_used = usage.percent_used,
            free_mb = usage.free_mb,
            "memory evaluated"
        );
        Ok(usage.to_check_result())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Check the memory of the host described by `session`.
///
/// The blocking SNMP exchange runs on tokio's blocking pool. The wait is
/// capped at the transport's budget for all [`ROUND_TRIPS`] requests plus a
/// grace period, so every configured retry gets its turn.
///
/// # Errors
///
/// Returns the probe's error, or [`ProbeError::Timeout`] if the exchange
/// outlives its deadline.
pub async fn check_host(
    session: SessionConfig,
    thresholds: Thresholds,
) -> Result<CheckResult, ProbeError> {
    let deadline = session.overall_deadline(ROUND_TRIPS);
    let worker = task::spawn_blocking(move || {
        let fetcher = SnmpFetcher::connect(&session)?;
        MemoryProbe::new(fetcher, thresholds).check()
    });

    match time::timeout(deadline, worker).await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => Err(ProbeError::query("running the SNMP exchange", err.to_string())),
        Err(_) => Err(ProbeError::timeout(deadline, "waiting for the SNMP agent")),
    }
}
