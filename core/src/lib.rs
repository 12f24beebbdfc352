//! # snmpcheck-rs-core
//!
//! Core library for the snmpcheck-rs probe suite providing shared functionality
//! for Nagios-compatible monitoring plugins that query remote hosts over SNMP.
//!
//! ## Features
//!
//! - **Plugin status model** - OK/WARNING/CRITICAL/UNKNOWN with fixed exit codes
//! - **Typed thresholds** - `N` / `N%` parsed once into a sum type
//! - **Plugin output format** - status line with performance data after the pipe
//! - **Common probe trait** - Standardized probe interface
//! - **Configuration management** - RON-based configuration with defaults
//! - **Error handling** - Error types that always map to `UNKNOWN`
//!
//! ## Quick Start
//!
//! ```rust
//! use snmpcheck_rs_core::{CheckResult, PerfData, Probe, ProbeError, Status};
//!
//! struct UptimeProbe {
//!     name: String,
//! }
//!
//! impl Probe for UptimeProbe {
//!     type Error = ProbeError;
//!
//!     fn check(&mut self) -> Result<CheckResult, Self::Error> {
//!         Ok(CheckResult::new(Status::Ok, "Uptime 12 days")
//!             .with_perfdata(PerfData::new("uptime", 1_036_800, "s")))
//!     }
//!
//!     fn name(&self) -> &str {
//!         &self.name
//!     }
//! }
//! ```

use nagiosplugin::State;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV_VAR: &str = "SNMPCHECK_LOG";

/// Plugin status as understood by Nagios-compatible supervisors.
///
/// Mirrors [`nagiosplugin::State`], which owns the exit code mapping, and
/// adds the uppercase JSON form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Value within thresholds
    Ok,
    /// Warning threshold reached
    Warning,
    /// Critical threshold reached
    Critical,
    /// Operational failure, no verdict could be produced
    Unknown,
}

impl Status {
    /// The `nagiosplugin` state reported for this status.
    #[must_use]
    pub const fn state(self) -> State {
        match self {
            Self::Ok => State::Ok,
            Self::Warning => State::Warning,
            Self::Critical => State::Critical,
            Self::Unknown => State::Unknown,
        }
    }

    /// Process exit code for this status.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        self.state().exit_code()
    }

    /// Status for a value where higher is worse.
    ///
    /// - `Critical` if `value >= critical`
    /// - `Warning` if `value >= warning`
    /// - `Ok` otherwise
    #[must_use]
    pub fn for_upper_thresholds(value: f64, warning: f64, critical: f64) -> Self {
        if value >= critical {
            Self::Critical
        } else if value >= warning {
            Self::Warning
        } else {
            Self::Ok
        }
    }

    /// Status for a value where lower is worse.
    ///
    /// - `Critical` if `value <= critical`
    /// - `Warning` if `value <= warning`
    /// - `Ok` otherwise
    #[must_use]
    pub fn for_lower_thresholds(value: f64, warning: f64, critical: f64) -> Self {
        if value <= critical {
            Self::Critical
        } else if value <= warning {
            Self::Warning
        } else {
            Self::Ok
        }
    }
}

impl From<Status> for State {
    fn from(status: Status) -> Self {
        status.state()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A single warning or critical threshold.
///
/// Parsed from `N` (absolute megabytes) or `N%` (percentage).
///
/// # Examples
///
/// ```rust
/// use snmpcheck_rs_core::Threshold;
///
/// let t: Threshold = "85%".parse().unwrap();
/// assert_eq!(t, Threshold::Percent(85.0));
///
/// let t: Threshold = "512".parse().unwrap();
/// assert_eq!(t, Threshold::AbsoluteMb(512.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum Threshold {
    /// Percentage of memory in use (may exceed 100)
    Percent(f64),
    /// Megabytes of memory still free
    AbsoluteMb(f64),
}

impl Threshold {
    /// The numeric part of the threshold, regardless of its unit.
    #[must_use]
    pub const fn value(&self) -> f64 {
        match self {
            Self::Percent(v) | Self::AbsoluteMb(v) => *v,
        }
    }

    /// Whether the threshold carried a `%` marker.
    #[must_use]
    pub const fn is_percent(&self) -> bool {
        matches!(self, Self::Percent(_))
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(v) => write!(f, "{}%", v),
            Self::AbsoluteMb(v) => write!(f, "{}", v),
        }
    }
}

impl std::str::FromStr for Threshold {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (number, percent) = match trimmed.strip_suffix('%') {
            Some(number) => (number.trim_end(), true),
            None => (trimmed, false),
        };

        let value = number
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| ThresholdParseError {
                input: s.to_owned(),
            })?;

        Ok(if percent {
            Self::Percent(value)
        } else {
            Self::AbsoluteMb(value)
        })
    }
}

impl TryFrom<String> for Threshold {
    type Error = ThresholdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Threshold> for String {
    fn from(threshold: Threshold) -> Self {
        threshold.to_string()
    }
}

/// Error type for parsing [`Threshold`] from string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid threshold '{input}'. Expected a non-negative number, optionally followed by '%'")]
pub struct ThresholdParseError {
    input: String,
}

/// How a pair of thresholds is compared against a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    /// Compare against percentage used; higher is worse
    Percent,
    /// Compare against free megabytes; lower is worse
    AbsoluteMb,
}

/// Warning and critical thresholds for one check.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Thresholds {
    pub warning: Threshold,
    pub critical: Threshold,
}

impl Thresholds {
    #[must_use]
    pub const fn new(warning: Threshold, critical: Threshold) -> Self {
        Self { warning, critical }
    }

    /// Comparison mode shared by both thresholds.
    ///
    /// A `%` on either threshold puts *both* into percentage mode; the other
    /// one's number is then read as a percentage too. Mixed input such as
    /// `-w 80% -c 1024` therefore compares `1024` against percent used.
    #[must_use]
    pub const fn mode(&self) -> ThresholdMode {
        if self.warning.is_percent() || self.critical.is_percent() {
            ThresholdMode::Percent
        } else {
            ThresholdMode::AbsoluteMb
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: default_warning(),
            critical: default_critical(),
        }
    }
}

/// One performance data item, rendered as `'label'=<value><unit>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerfData {
    pub label: String,
    pub value: i64,
    pub unit: String,
}

impl PerfData {
    #[must_use]
    pub fn new(label: impl Into<String>, value: i64, unit: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value,
            unit: unit.into(),
        }
    }
}

impl fmt::Display for PerfData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}{}",
            format::quote_label(&self.label),
            self.value,
            self.unit
        )
    }
}

/// Result of a single check: status, human readable summary and perfdata.
///
/// `Display` renders the line printed on stdout:
///
/// ```rust
/// use snmpcheck_rs_core::{CheckResult, PerfData, Status};
///
/// let result = CheckResult::new(Status::Warning, "Load at 4.2")
///     .with_perfdata(PerfData::new("load", 4, ""));
/// assert_eq!(result.to_string(), "WARNING: Load at 4.2 | 'load'=4");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub status: Status,
    pub summary: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub perfdata: Vec<PerfData>,
}

impl CheckResult {
    #[must_use]
    pub fn new(status: Status, summary: impl Into<String>) -> Self {
        Self {
            status,
            summary: summary.into(),
            perfdata: Vec::new(),
        }
    }

    /// An `UNKNOWN` result carrying a one-line failure message.
    #[must_use]
    pub fn unknown(message: impl AsRef<str>) -> Self {
        Self::new(Status::Unknown, format::single_line(message.as_ref()))
    }

    /// Append a performance data item.
    #[must_use]
    pub fn with_perfdata(mut self, perfdata: PerfData) -> Self {
        self.perfdata.push(perfdata);
        self
    }

    /// Process exit code for this result.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    /// Serialize the result as a JSON object.
    pub fn to_json(&self) -> Result<String, ProbeError> {
        serde_json::to_string(self).map_err(|e| ProbeError::Io(e.into()))
    }
}

impl From<&ProbeError> for CheckResult {
    fn from(err: &ProbeError) -> Self {
        Self::unknown(err.to_string())
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.summary)?;
        if !self.perfdata.is_empty() {
            f.write_str(" |")?;
            for item in &self.perfdata {
                write!(f, " {}", item)?;
            }
        }
        Ok(())
    }
}

/// Global configuration loaded from ~/.config/snmpcheck-rs/config.ron
///
/// Every field is optional in the file; command line flags take precedence.
///
/// ```ron
/// (
///     port: 161,
///     community: "public",
///     timeout_secs: 5,
///     retries: 1,
///     warning: "85%",
///     critical: "90%",
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// SNMP agent UDP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Community string used for read access
    #[serde(default = "default_community")]
    pub community: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of times a timed out request is re-sent
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Default warning threshold
    #[serde(default = "default_warning")]
    pub warning: Threshold,
    /// Default critical threshold
    #[serde(default = "default_critical")]
    pub critical: Threshold,
}

fn default_port() -> u16 {
    161
}

fn default_community() -> String {
    "public".to_owned()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_retries() -> u32 {
    1
}

fn default_warning() -> Threshold {
    Threshold::Percent(85.0)
}

fn default_critical() -> Threshold {
    Threshold::Percent(90.0)
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            community: default_community(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            warning: default_warning(),
            critical: default_critical(),
        }
    }
}

impl GlobalConfig {
    /// Load configuration from the standard config file location.
    ///
    /// Searches for config in:
    /// 1. ~/.config/snmpcheck-rs/config.ron
    /// 2. ~/.snmpcheck-rs/config.ron (fallback)
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self, ProbeError> {
        if let Some(config_path) = Self::find_config_file() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ProbeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProbeError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_ron(&content)
            .map_err(|e| ProbeError::config(format!("{} ({})", e, path.display())))
    }

    /// Parse configuration from RON text.
    pub fn from_ron(content: &str) -> Result<Self, ProbeError> {
        ron::from_str(content)
            .map_err(|e| ProbeError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Find the config file in standard locations.
    pub fn find_config_file() -> Option<PathBuf> {
        // Try XDG config directory first
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_path = config_dir.join("snmpcheck-rs").join("config.ron");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".snmpcheck-rs").join("config.ron");
            if home_path.exists() {
                return Some(home_path);
            }
        }

        None
    }

    /// Build the session configuration for `host` from these defaults.
    #[must_use]
    pub fn to_session_config(&self, host: impl Into<String>) -> SessionConfig {
        SessionConfig {
            host: host.into(),
            port: self.port,
            community: self.community.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            retries: self.retries,
        }
    }

    /// Thresholds configured as defaults.
    #[must_use]
    pub const fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.warning, self.critical)
    }
}

/// Connection parameters for one SNMP session.
///
/// Built once from [`GlobalConfig`] plus command line overrides and never
/// mutated afterwards.
///
/// # Examples
///
/// ```rust
/// use snmpcheck_rs_core::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::new("192.0.2.10")
///     .with_port(1161)
///     .with_community("monitor")
///     .with_timeout(Duration::from_secs(2));
/// assert_eq!(config.port, 1161);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub community: String,
    pub timeout: Duration,
    pub retries: u32,
}

impl SessionConfig {
    /// Grace period added on top of the transport's own retry budget.
    pub const DEADLINE_GRACE: Duration = Duration::from_secs(1);

    /// Session to `host` with the built-in defaults.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        GlobalConfig::default().to_session_config(host)
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_community(mut self, community: impl Into<String>) -> Self {
        self.community = community.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Upper bound on how long `round_trips` sequential requests may take.
    ///
    /// Each request may use its full timeout once per attempt, so the budget
    /// is `timeout * (retries + 1) * round_trips` plus [`Self::DEADLINE_GRACE`].
    #[must_use]
    pub fn overall_deadline(&self, round_trips: u32) -> Duration {
        self.timeout
            .saturating_mul(self.retries.saturating_add(1))
            .saturating_mul(round_trips)
            .saturating_add(Self::DEADLINE_GRACE)
    }
}

/// Trait for all probes producing a plugin check result.
///
/// # Examples
///
/// ```rust
/// use snmpcheck_rs_core::{CheckResult, Probe, ProbeError, Status};
///
/// struct AlwaysOk;
///
/// impl Probe for AlwaysOk {
///     type Error = ProbeError;
///
///     fn check(&mut self) -> Result<CheckResult, Self::Error> {
///         Ok(CheckResult::new(Status::Ok, "all good"))
///     }
///
///     fn name(&self) -> &str {
///         "always-ok"
///     }
/// }
/// ```
pub trait Probe {
    /// Error type for probe operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run the check once and return its verdict.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be obtained or is unusable. The
    /// caller reports such errors as `UNKNOWN`.
    fn check(&mut self) -> Result<CheckResult, Self::Error>;

    /// Get the unique name/identifier for this probe.
    fn name(&self) -> &str;
}

/// Install the global `tracing` subscriber writing to stderr.
///
/// The filter comes from [`LOG_ENV_VAR`] when set, otherwise from
/// `verbosity` (0 = warn, 1 = info, 2 = debug, 3+ = trace). Stdout is left
/// untouched for the plugin output.
pub fn init_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(level));

    // Ignored when a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Utility functions for formatting plugin output.
pub mod format {
    /// Round to the nearest integer, halves away from zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use snmpcheck_rs_core::format::round_half_away;
    ///
    /// assert_eq!(round_half_away(7812.5), 7813);
    /// assert_eq!(round_half_away(-2.5), -3);
    /// assert_eq!(round_half_away(52.49), 52);
    /// ```
    #[must_use]
    pub fn round_half_away(value: f64) -> i64 {
        // f64::round rounds half-way cases away from 0.0
        value.round() as i64
    }

    /// Quote a perfdata label, doubling embedded single quotes.
    #[must_use]
    pub fn quote_label(label: &str) -> String {
        format!("'{}'", label.replace('\'', "''"))
    }

    /// Collapse a message onto one line, dropping the pipe that would start
    /// the perfdata section.
    #[must_use]
    pub fn single_line(message: &str) -> String {
        message
            .split(|c| c == '\n' || c == '\r')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .replace('|', "/")
    }
}

/// Common error types for probe operations.
///
/// Every variant is an operational failure and is reported as `UNKNOWN`.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// I/O error outside of the SNMP exchange.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session to the agent could not be established.
    #[error("Session error for {target}: {reason}")]
    Session {
        /// Host and port the session was meant for
        target: String,
        reason: String,
    },

    /// A request failed or was rejected by the agent.
    #[error("Query error while {operation}: {reason}")]
    Query {
        /// Description of the request that failed
        operation: String,
        reason: String,
    },

    /// The overall deadline expired.
    #[error("Timeout after {duration:?} while {operation}")]
    Timeout {
        duration: Duration,
        operation: String,
    },

    /// Invalid command line input.
    #[error("Argument error: {message}")]
    Argument { message: String },

    /// Counters were fetched but cannot be evaluated.
    #[error("Invalid reading: {message}")]
    InvalidReading { message: String },

    /// Configuration file could not be used.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ProbeError {
    /// Create a new session error.
    pub fn session<T: Into<String>, R: Into<String>>(target: T, reason: R) -> Self {
        Self::Session {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a new query error.
    pub fn query<O: Into<String>, R: Into<String>>(operation: O, reason: R) -> Self {
        Self::Query {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(duration: Duration, operation: S) -> Self {
        Self::Timeout {
            duration,
            operation: operation.into(),
        }
    }

    /// Create a new argument error.
    pub fn argument<S: Into<String>>(message: S) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }

    /// Create a new invalid reading error.
    pub fn invalid_reading<S: Into<String>>(message: S) -> Self {
        Self::InvalidReading {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Plugin status for this error; always `UNKNOWN`.
    #[must_use]
    pub const fn status(&self) -> Status {
        Status::Unknown
    }

    /// Whether this error came from the network exchange.
    #[must_use]
    pub const fn is_query_failure(&self) -> bool {
        matches!(self, Self::Query { .. } | Self::Timeout { .. })
    }
}

impl From<ThresholdParseError> for ProbeError {
    fn from(err: ThresholdParseError) -> Self {
        Self::argument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal generic perfdata parser: `'label'=<number><unit>` items.
    fn parse_perfdata(segment: &str) -> Vec<(String, f64, String)> {
        let mut items = Vec::new();
        let mut rest = segment.trim();
        while !rest.is_empty() {
            let (label, after) = if let Some(stripped) = rest.strip_prefix('\'') {
                let end = stripped.find("'=").expect("closing quote");
                (stripped[..end].to_owned(), &stripped[end + 2..])
            } else {
                let end = rest.find('=').expect("equals sign");
                (rest[..end].to_owned(), &rest[end + 1..])
            };
            let token_end = after.find(' ').unwrap_or(after.len());
            let token = &after[..token_end];
            let digits_end = token
                .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
                .unwrap_or(token.len());
            let value = token[..digits_end].parse::<f64>().expect("numeric value");
            items.push((label, value, token[digits_end..].to_owned()));
            rest = after[token_end..].trim_start();
        }
        items
    }

    #[test]
    fn test_status_exit_codes_follow_plugin_state() {
        for status in [Status::Ok, Status::Warning, Status::Critical, Status::Unknown] {
            assert_eq!(status.exit_code(), State::from(status).exit_code());
        }
    }

    #[test]
    fn test_status_exit_codes() {
        assert_eq!(Status::Ok.exit_code(), 0);
        assert_eq!(Status::Warning.exit_code(), 1);
        assert_eq!(Status::Critical.exit_code(), 2);
        assert_eq!(Status::Unknown.exit_code(), 3);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Ok.to_string(), "OK");
        assert_eq!(Status::Warning.to_string(), "WARNING");
        assert_eq!(Status::Critical.to_string(), "CRITICAL");
        assert_eq!(Status::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_status_thresholds_are_inclusive() {
        assert_eq!(Status::for_upper_thresholds(90.0, 85.0, 90.0), Status::Critical);
        assert_eq!(Status::for_upper_thresholds(85.0, 85.0, 90.0), Status::Warning);
        assert_eq!(Status::for_upper_thresholds(84.0, 85.0, 90.0), Status::Ok);

        assert_eq!(Status::for_lower_thresholds(50.0, 100.0, 50.0), Status::Critical);
        assert_eq!(Status::for_lower_thresholds(100.0, 100.0, 50.0), Status::Warning);
        assert_eq!(Status::for_lower_thresholds(101.0, 100.0, 50.0), Status::Ok);
    }

    #[test]
    fn test_threshold_parse() {
        assert_eq!("85%".parse::<Threshold>().unwrap(), Threshold::Percent(85.0));
        assert_eq!("  90 % ".parse::<Threshold>().unwrap(), Threshold::Percent(90.0));
        assert_eq!("150%".parse::<Threshold>().unwrap(), Threshold::Percent(150.0));
        assert_eq!("1024".parse::<Threshold>().unwrap(), Threshold::AbsoluteMb(1024.0));
        assert_eq!("0".parse::<Threshold>().unwrap(), Threshold::AbsoluteMb(0.0));
        assert_eq!("12.5".parse::<Threshold>().unwrap(), Threshold::AbsoluteMb(12.5));

        assert!("".parse::<Threshold>().is_err());
        assert!("%".parse::<Threshold>().is_err());
        assert!("-5".parse::<Threshold>().is_err());
        assert!("abc".parse::<Threshold>().is_err());
        assert!("NaN".parse::<Threshold>().is_err());
        assert!("inf%".parse::<Threshold>().is_err());
    }

    #[test]
    fn test_threshold_parse_error_becomes_argument_error() {
        let err: ProbeError = "lots".parse::<Threshold>().unwrap_err().into();
        assert!(matches!(err, ProbeError::Argument { .. }));
        assert!(err.to_string().contains("'lots'"));
    }

    #[test]
    fn test_threshold_mode_is_shared() {
        let percent = Thresholds::new(Threshold::Percent(85.0), Threshold::Percent(90.0));
        assert_eq!(percent.mode(), ThresholdMode::Percent);

        let absolute = Thresholds::new(Threshold::AbsoluteMb(90.0), Threshold::AbsoluteMb(50.0));
        assert_eq!(absolute.mode(), ThresholdMode::AbsoluteMb);

        let mixed = Thresholds::new(Threshold::Percent(80.0), Threshold::AbsoluteMb(1024.0));
        assert_eq!(mixed.mode(), ThresholdMode::Percent);

        let mixed = Thresholds::new(Threshold::AbsoluteMb(80.0), Threshold::Percent(95.0));
        assert_eq!(mixed.mode(), ThresholdMode::Percent);
    }

    #[test]
    fn test_check_result_line() {
        let result = CheckResult::new(Status::Ok, "Memory at 53% with 3711 of 7813 MB free")
            .with_perfdata(PerfData::new("percent used", 53, "%"))
            .with_perfdata(PerfData::new("free", 3_891_200_000, "B"));

        assert_eq!(
            result.to_string(),
            "OK: Memory at 53% with 3711 of 7813 MB free | 'percent used'=53% 'free'=3891200000B"
        );
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn test_perfdata_segment_reparses() {
        let result = CheckResult::new(Status::Critical, "Memory at 97% with 10 of 300 MB free")
            .with_perfdata(PerfData::new("percent used", 97, "%"))
            .with_perfdata(PerfData::new("free", 10_240, "B"));
        let line = result.to_string();

        let (_, segment) = line.split_once(" | ").unwrap();
        assert!(!segment.contains('|'));

        let items = parse_perfdata(segment);
        assert_eq!(
            items,
            vec![
                ("percent used".to_owned(), 97.0, "%".to_owned()),
                ("free".to_owned(), 10_240.0, "B".to_owned()),
            ]
        );
        assert!(items.iter().all(|(_, value, _)| *value >= 0.0));
    }

    #[test]
    fn test_quote_label_escapes_quotes() {
        assert_eq!(format::quote_label("free"), "'free'");
        assert_eq!(format::quote_label("it's"), "'it''s'");
    }

    #[test]
    fn test_unknown_result_is_single_line() {
        let result = CheckResult::unknown("first line\nsecond | line\n");
        assert_eq!(result.to_string(), "UNKNOWN: first line second / line");
        assert_eq!(result.exit_code(), 3);
        assert!(result.perfdata.is_empty());
    }

    #[test]
    fn test_unknown_from_error() {
        let err = ProbeError::session("nowhere:161", "failed to lookup address");
        let result = CheckResult::from(&err);
        assert!(result.to_string().starts_with("UNKNOWN: Session error for nowhere:161"));
        assert_eq!(err.status(), Status::Unknown);
    }

    #[test]
    fn test_check_result_json() {
        let result = CheckResult::new(Status::Warning, "Memory at 86%")
            .with_perfdata(PerfData::new("percent used", 86, "%"));
        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();

        assert_eq!(json["status"], "WARNING");
        assert_eq!(json["summary"], "Memory at 86%");
        assert_eq!(json["perfdata"][0]["label"], "percent used");
        assert_eq!(json["perfdata"][0]["value"], 86);
        assert_eq!(json["perfdata"][0]["unit"], "%");
    }

    #[test]
    fn test_global_config_defaults() {
        let config = GlobalConfig::default();
        assert_eq!(config.port, 161);
        assert_eq!(config.community, "public");
        assert_eq!(config.retries, 1);
        assert_eq!(config.thresholds(), Thresholds::default());
        assert_eq!(config.warning, Threshold::Percent(85.0));
        assert_eq!(config.critical, Threshold::Percent(90.0));
    }

    #[test]
    fn test_global_config_from_ron() {
        let config =
            GlobalConfig::from_ron(r#"(port: 1161, community: "monitor", warning: "512")"#).unwrap();
        assert_eq!(config.port, 1161);
        assert_eq!(config.community, "monitor");
        assert_eq!(config.warning, Threshold::AbsoluteMb(512.0));
        // Unset fields fall back to defaults
        assert_eq!(config.critical, Threshold::Percent(90.0));
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_global_config_rejects_bad_threshold() {
        let err = GlobalConfig::from_ron(r#"(critical: "ninety")"#).unwrap_err();
        assert!(matches!(err, ProbeError::Config { .. }));
    }

    #[test]
    fn test_global_config_missing_file() {
        let err = GlobalConfig::load_from_file(Path::new("/nonexistent/snmpcheck-rs.ron"))
            .unwrap_err();
        assert!(matches!(err, ProbeError::Config { .. }));
    }

    #[test]
    fn test_session_config_builder() {
        let config = GlobalConfig::default()
            .to_session_config("db01")
            .with_port(1161)
            .with_community("secret")
            .with_timeout(Duration::from_secs(2))
            .with_retries(2);

        assert_eq!(config.host, "db01");
        assert_eq!(config.port, 1161);
        assert_eq!(config.community, "secret");
        assert_eq!(config.overall_deadline(1), Duration::from_secs(7));
    }

    #[test]
    fn test_deadline_covers_every_round_trip() {
        let config = SessionConfig::new("db01")
            .with_timeout(Duration::from_secs(2))
            .with_retries(2);

        // Two requests, each allowed three attempts of two seconds
        let transport_budget = Duration::from_secs(12);
        assert_eq!(config.overall_deadline(2), transport_budget + SessionConfig::DEADLINE_GRACE);
        assert!(config.overall_deadline(2) > transport_budget);
        assert!(config.overall_deadline(2) > config.overall_deadline(1));
    }
}
