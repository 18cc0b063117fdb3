use crate::details::icmp::Ttl;
use crate::{AddressFamily, ProbeError};
use std::time::Duration;

pub const DEFAULT_TTL: u8 = 255;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_PROBE_DEADLINE: Duration = Duration::from_secs(1);

/// Probe parameters, fixed once the run starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeConfig {
    ttl: Ttl,
    family: AddressFamily,
    identifier: u16,
    interval: Duration,
    probe_deadline: Duration,
}

impl ProbeConfig {
    /// Uses a random echo identifier and the default tick interval and probe deadline.
    pub fn new(ttl: Ttl, family: AddressFamily) -> Self {
        ProbeConfig {
            ttl,
            family,
            identifier: rand::random::<u16>(),
            interval: DEFAULT_INTERVAL,
            probe_deadline: DEFAULT_PROBE_DEADLINE,
        }
    }

    #[must_use]
    pub fn with_identifier(mut self, identifier: u16) -> Self {
        self.identifier = identifier;
        self
    }

    /// Probes never overlap because the deadline is strictly shorter than the interval.
    pub fn with_timing(mut self, interval: Duration, probe_deadline: Duration) -> Result<Self, ProbeError> {
        if probe_deadline.is_zero() {
            return Err(ProbeError::InvalidConfig("probe deadline must be positive".to_owned()));
        }
        if probe_deadline >= interval {
            return Err(ProbeError::InvalidConfig(format!(
                "probe deadline {probe_deadline:?} must be shorter than the interval {interval:?}"
            )));
        }
        self.interval = interval;
        self.probe_deadline = probe_deadline;
        Ok(self)
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn probe_deadline(&self) -> Duration {
        self.probe_deadline
    }
}
