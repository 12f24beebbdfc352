//! Remote counter fetching over SNMPv2c.
//!
//! Reads the `hrStorageSize` and `hrStorageUsed` columns of the host resources
//! storage table. Only GET requests are issued; values are returned as raw
//! integers without interpretation.

use crate::memory::{MemorySamples, StorageSample};
use crate::wire::{self, Reply};
use snmpcheck_rs_core::{ProbeError, SessionConfig};
use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::{debug, warn};

/// `hrStorageEntry`, `.1.3.6.1.2.1.25.2.3.1`
pub const HR_STORAGE_ENTRY: [u32; 10] = [1, 3, 6, 1, 2, 1, 25, 2, 3, 1];

/// `hrStorageSize` column.
pub const FIELD_SIZE: u32 = 5;
/// `hrStorageUsed` column.
pub const FIELD_USED: u32 = 6;

/// Row holding total physical memory.
pub const ROW_TOTAL: u32 = 1;
/// Row holding memory used for buffers.
pub const ROW_BUFFERS: u32 = 6;
/// Row holding cached memory.
pub const ROW_CACHED: u32 = 7;

/// Object identifier of one cell in the storage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageOid {
    pub field: u32,
    pub row: u32,
}

impl StorageOid {
    #[must_use]
    pub const fn new(field: u32, row: u32) -> Self {
        Self { field, row }
    }

    /// `hrStorageUsed.<row>`
    #[must_use]
    pub const fn used(row: u32) -> Self {
        Self::new(FIELD_USED, row)
    }

    /// `hrStorageSize.<row>`
    #[must_use]
    pub const fn size(row: u32) -> Self {
        Self::new(FIELD_SIZE, row)
    }

    /// Full numeric identifier, base included.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u32> {
        let mut oid = HR_STORAGE_ENTRY.to_vec();
        oid.push(self.field);
        oid.push(self.row);
        oid
    }
}

impl fmt::Display for StorageOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in self.to_vec() {
            write!(f, ".{}", part)?;
        }
        Ok(())
    }
}

/// Source of raw integer counters.
///
/// One call is one request round-trip. Implementations return exactly one
/// value per requested identifier, in request order.
pub trait CounterSource {
    /// Fetch the current value of every identifier in `oids`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Query`] if the request cannot be completed or the
    /// agent rejects any of the identifiers.
    fn fetch(&mut self, oids: &[StorageOid]) -> Result<Vec<i64>, ProbeError>;
}

/// Number of [`CounterSource::fetch`] calls made by [`fetch_samples`].
pub const ROUND_TRIPS: u32 = 2;

/// Fetch the three storage rows needed for a memory reading.
///
/// Issues exactly [`ROUND_TRIPS`] round-trips: the used and size cells of the total row,
/// then the used cells of the buffers and cached rows.
pub fn fetch_samples<S: CounterSource + ?Sized>(
    source: &mut S,
) -> Result<MemorySamples, ProbeError> {
    let total = source.fetch(&[StorageOid::used(ROW_TOTAL), StorageOid::size(ROW_TOTAL)])?;
    let (total_used, total_size) = match total.as_slice() {
        [used, size] => (*used, *size),
        other => return Err(unexpected_count(2, other.len())),
    };

    let cache = source.fetch(&[StorageOid::used(ROW_BUFFERS), StorageOid::used(ROW_CACHED)])?;
    let (buffers_used, cached_used) = match cache.as_slice() {
        [buffers, cached] => (*buffers, *cached),
        other => return Err(unexpected_count(2, other.len())),
    };

    Ok(MemorySamples {
        total: StorageSample::with_size(total_used, total_size),
        buffers: StorageSample::new(buffers_used),
        cached: StorageSample::new(cached_used),
    })
}

fn unexpected_count(expected: usize, got: usize) -> ProbeError {
    ProbeError::query(
        "reading storage table",
        format!("expected {} values, got {}", expected, got),
    )
}

/// [`CounterSource`] speaking SNMPv2c GET over UDP.
///
/// Each [`fetch`](CounterSource::fetch) sends one GetRequest carrying all
/// requested identifiers. A request that gets no answer within the timeout is
/// re-sent up to `retries` more times with the same request id.
pub struct SnmpFetcher {
    socket: UdpSocket,
    target: SocketAddr,
    community: Vec<u8>,
    retries: u32,
    next_request_id: i32,
    buffer: Vec<u8>,
}

impl fmt::Debug for SnmpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnmpFetcher")
            .field("target", &self.target)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

/// Why a single request/response exchange failed.
enum ExchangeError {
    /// Nothing usable came back; the request may be re-sent.
    Transport(io::Error),
    /// The agent answered but the answer cannot be used.
    Rejected(String),
}

impl SnmpFetcher {
    /// Largest datagram accepted from the agent.
    const MAX_DATAGRAM: usize = 65_507;

    /// Open a session to the agent described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Session`] if the host is empty or cannot be
    /// resolved, or the local socket cannot be set up.
    pub fn connect(config: &SessionConfig) -> Result<Self, ProbeError> {
        let label = format!("{}:{}", config.host, config.port);
        let host = config.host.trim();
        if host.is_empty() {
            return Err(ProbeError::session(label, "host is empty"));
        }

        let target = (host, config.port)
            .to_socket_addrs()
            .map_err(|e| ProbeError::session(&label, e.to_string()))?
            .next()
            .ok_or_else(|| ProbeError::session(&label, "host resolved to no addresses"))?;

        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .and_then(|socket| {
                socket.connect(target)?;
                socket.set_read_timeout(Some(config.timeout))?;
                Ok(socket)
            })
            .map_err(|e| ProbeError::session(&label, e.to_string()))?;

        debug!(%target, timeout = ?config.timeout, retries = config.retries, "SNMP session ready");

        Ok(Self {
            socket,
            target,
            community: config.community.as_bytes().to_vec(),
            retries: config.retries,
            next_request_id: initial_request_id(),
            buffer: vec![0; Self::MAX_DATAGRAM],
        })
    }

    /// Address of the agent this session talks to.
    #[must_use]
    pub const fn target(&self) -> SocketAddr {
        self.target
    }

    fn take_request_id(&mut self) -> i32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1) & i32::MAX;
        id
    }

    /// Send `request` once and wait for the matching response.
    fn exchange(
        &mut self,
        request: &[u8],
        request_id: i32,
        expected: usize,
    ) -> Result<Vec<i64>, ExchangeError> {
        self.socket.send(request).map_err(ExchangeError::Transport)?;
        loop {
            let len = self.socket.recv(&mut self.buffer).map_err(ExchangeError::Transport)?;
            match wire::decode_response(&self.buffer[..len], &self.community, request_id, expected) {
                Ok(Reply::Counters(values)) => return Ok(values),
                Ok(Reply::Stale) => debug!("discarding response to an earlier request"),
                Err(reason) => return Err(ExchangeError::Rejected(reason)),
            }
        }
    }
}

/// Request ids only need to differ between runs that may overlap.
fn initial_request_id() -> i32 {
    (std::process::id() & 0x7fff_ffff) as i32
}

impl CounterSource for SnmpFetcher {
    fn fetch(&mut self, oids: &[StorageOid]) -> Result<Vec<i64>, ProbeError> {
        let operation = format!(
            "querying {} for {}",
            self.target,
            oids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );
        let names: Vec<Vec<u32>> = oids.iter().map(StorageOid::to_vec).collect();
        let request_id = self.take_request_id();
        let request = wire::encode_get_request(&self.community, request_id, &names);

        let mut last_error = None;
        for attempt in 0..=self.retries {
            if let Some(err) = &last_error {
                warn!(error = %err, attempt, retries = self.retries, "SNMP request failed, retrying");
            }
            debug!(attempt, request_id, "{}", operation);

            match self.exchange(&request, request_id, oids.len()) {
                Ok(values) => return Ok(values),
                Err(ExchangeError::Transport(err)) => last_error = Some(err),
                Err(ExchangeError::Rejected(reason)) => {
                    return Err(ProbeError::query(operation, reason));
                }
            }
        }

        let reason = match last_error {
            Some(err) if is_timeout(&err) => "no response from agent".to_owned(),
            Some(err) => err.to_string(),
            None => "request was never sent".to_owned(),
        };
        Err(ProbeError::query(
            operation,
            format!("{} after {} attempt(s)", reason, self.retries + 1),
        ))
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
