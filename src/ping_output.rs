use crate::details::icmp::{SequenceNumber, Ttl};
use crate::Target;
use std::io::{self, Write};
use std::time::Duration;

/// Result of one tick. `round_trip` is `None` for a lost probe.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProbeOutcome {
    pub sequence_number: SequenceNumber,
    pub round_trip: Option<Duration>,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        self.round_trip.is_some()
    }
}

pub fn write_start_line(out: &mut impl Write, target: &Target) -> io::Result<()> {
    writeln!(out, "PING {target}")
}

pub fn write_success_line(
    out: &mut impl Write,
    target: &Target,
    sequence_number: SequenceNumber,
    packets_lost: u64,
    ttl: Ttl,
    latency: Duration,
) -> io::Result<()> {
    writeln!(
        out,
        "Response from {target}: icmp_seq={sequence_number} packets_lost={packets_lost} ttl={ttl} latency={latency:?}"
    )
}

pub fn write_failure_line(out: &mut impl Write, target: &Target, sequence_number: SequenceNumber) -> io::Result<()> {
    writeln!(out, "Request timeout for icmp_seq {sequence_number} no route to host {target}")
}
