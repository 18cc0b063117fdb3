use crate::details::icmp::socket::RawSocketOpener;
use crate::details::transport::Transport;
use crate::{ProbeConfig, ProbeError, SequenceNumber, Target};
use std::time::Duration;

/// One complete echo transaction: send a request and wait for its reply or the deadline.
pub trait Prober {
    /// Returns the measured round trip, which is always below `config.probe_deadline()`.
    fn probe_once(
        &mut self,
        target: &Target,
        config: &ProbeConfig,
        sequence_number: SequenceNumber,
    ) -> Result<Duration, ProbeError>;
}

/// Probes over a raw ICMP socket opened afresh for every transaction.
/// Opening the socket usually needs elevated privileges.
pub struct EchoTransport(Transport<RawSocketOpener>);

impl EchoTransport {
    pub fn new() -> Self {
        EchoTransport(Transport::new(RawSocketOpener))
    }
}

impl Default for EchoTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for EchoTransport {
    fn probe_once(
        &mut self,
        target: &Target,
        config: &ProbeConfig,
        sequence_number: SequenceNumber,
    ) -> Result<Duration, ProbeError> {
        self.0.probe_once(target, config, sequence_number)
    }
}
