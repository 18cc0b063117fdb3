use crate::{ProbeOutcome, Target};
use std::io::{self, Write};

/// Transmit/receive counters. Written only by the scheduling loop.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProbeStats {
    transmitted: u64,
    received: u64,
}

impl ProbeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &ProbeOutcome) {
        self.transmitted += 1;
        if outcome.is_success() {
            self.received += 1;
        }
    }

    pub fn transmitted(&self) -> u64 {
        self.transmitted
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn lost(&self) -> u64 {
        self.transmitted - self.received
    }

    /// Rounded half up; `None` before the first probe.
    pub fn loss_percent(&self) -> Option<u64> {
        if self.transmitted == 0 {
            return None;
        }
        Some((self.lost() * 100 + self.transmitted / 2) / self.transmitted)
    }
}

pub fn write_statistics(out: &mut impl Write, target: &Target, stats: &ProbeStats) -> io::Result<()> {
    writeln!(out, "--- {target} ping statistics ---")?;
    writeln!(
        out,
        "{} packets transmitted, {} packets received, {}% packet loss",
        stats.transmitted(),
        stats.received(),
        stats.loss_percent().unwrap_or(0)
    )
}
