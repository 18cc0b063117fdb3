use std::io::{self, Write};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::ping_output::{write_failure_line, write_start_line, write_success_line};
use crate::probe_stats::write_statistics;
use crate::{
    PingResult, ProbeConfig, ProbeError, ProbeOutcome, ProbeStats, Prober, SequenceNumber, StopCondition, Target,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum State {
    Running,
    Stopped,
}

/// Issues one probe per tick and owns the counters. Nothing else writes them.
pub struct ProbeScheduler<P, W> {
    target: Target,
    config: ProbeConfig,
    prober: P,
    out: W,
    sequence_number: SequenceNumber,
    stats: ProbeStats,
}

impl<P, W> ProbeScheduler<P, W>
where
    P: Prober,
    W: Write,
{
    pub fn new(target: Target, config: ProbeConfig, prober: P, out: W) -> Self {
        ProbeScheduler {
            target,
            config,
            prober,
            out,
            sequence_number: SequenceNumber::start_value(),
            stats: ProbeStats::new(),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn stats(&self) -> ProbeStats {
        self.stats
    }

    /// Sends one probe and prints its line. Only fatal errors are returned; every other failure
    /// is a lost probe.
    pub fn tick(&mut self) -> Result<ProbeOutcome, ProbeError> {
        let sequence_number = self.sequence_number;
        let round_trip = match self.prober.probe_once(&self.target, &self.config, sequence_number) {
            Ok(duration) => Some(duration),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::debug!("probe {sequence_number} to {} lost: {e}", self.target);
                None
            }
        };

        let outcome = ProbeOutcome { sequence_number, round_trip };
        self.stats.record(&outcome);
        self.sequence_number = sequence_number.next();

        if let Err(e) = self.write_outcome(&outcome) {
            tracing::error!("failed to write probe result: {e}");
        }
        Ok(outcome)
    }

    fn write_outcome(&mut self, outcome: &ProbeOutcome) -> io::Result<()> {
        match outcome.round_trip {
            Some(latency) => write_success_line(
                &mut self.out,
                &self.target,
                outcome.sequence_number,
                self.stats.lost(),
                self.config.ttl(),
                latency,
            )?,
            None => write_failure_line(&mut self.out, &self.target, outcome.sequence_number)?,
        }
        self.out.flush()
    }

    /// Ticks on a fixed wall-clock cadence, first tick one interval after the start, until
    /// `stop` is set. Stop is observed between ticks only; a probe in flight completes first.
    /// A fatal error sets `stop` itself so the owner wakes up.
    pub fn run(mut self, stop: &StopCondition) -> Result<ProbeStats, ProbeError> {
        if let Err(e) = write_start_line(&mut self.out, &self.target).and_then(|()| self.out.flush()) {
            tracing::error!("failed to write start line: {e}");
        }

        let interval = self.config.interval();
        let mut next_tick = Instant::now() + interval;
        while !stop.wait_until(next_tick) {
            if let Err(e) = self.tick() {
                tracing::error!("stopping probes to {}: {e}", self.target);
                stop.set_should_stop();
                return Err(e);
            }

            next_tick += interval;
            let now = Instant::now();
            while next_tick <= now {
                tracing::warn!("probe to {} overran the interval, skipping a tick", self.target);
                next_tick += interval;
            }
        }
        tracing::trace!("probe loop to {} stopped", self.target);
        Ok(self.stats)
    }
}

/// Runs a `ProbeScheduler` on its own thread.
pub struct PingRunner {
    states: Vec<State>,
    target: Target,
    stop: StopCondition,
    thread_handle: Option<JoinHandle<Result<ProbeStats, ProbeError>>>,
}

impl PingRunner {
    pub fn start<P, W>(scheduler: ProbeScheduler<P, W>, stop: StopCondition) -> Self
    where
        P: Prober + Send + 'static,
        W: Write + Send + 'static,
    {
        let target = *scheduler.target();
        let loop_stop = stop.clone();
        let thread_handle = std::thread::spawn(move || scheduler.run(&loop_stop));
        PingRunner {
            states: vec![State::Running],
            target,
            stop,
            thread_handle: Some(thread_handle),
        }
    }

    pub fn get_states(&self) -> Vec<State> {
        self.states.clone()
    }

    /// Stops the loop, waits for it and hands back the final counters. The counters are only
    /// read after the loop thread has finished.
    pub fn halt(&mut self) -> PingResult<ProbeStats> {
        let handle = self.thread_handle.take().ok_or("PingRunner is already stopped")?;
        self.stop.set_should_stop();
        let join_result = handle.join();
        self.states.push(State::Stopped);
        match join_result {
            Ok(Ok(stats)) => Ok(stats),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err("probe scheduler thread panicked".into()),
        }
    }

    /// Blocks until the run is interrupted, then halts the loop and writes the summary to `out`.
    /// A fatal error in the loop is returned instead and nothing is written.
    pub fn finish(&mut self, out: &mut impl Write) -> PingResult<ProbeStats> {
        self.stop.wait();
        let stats = self.halt()?;
        tracing::info!("probing {} interrupted", self.target);

        // Move past the echoed ^C.
        writeln!(out)?;
        writeln!(out, "interrupt")?;
        write_statistics(&mut *out, &self.target, &stats)?;
        out.flush()?;
        Ok(stats)
    }
}

impl Drop for PingRunner {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            let _ = self.halt();
        }
    }
}
