use crate::Result;
use serde::Serialize;
use std::{io, time::Instant};

/// Whether a phase kept the rank busy computing or waiting on its peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PhaseKind {
    #[serde(rename = "COMP")]
    Computation,
    #[serde(rename = "COMM")]
    Communication,
}

/// One timed phase of a distributed run. Times are seconds since the run started.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhaseEvent {
    pub rank: usize,
    pub start: f64,
    pub end: f64,
    #[serde(rename = "Type")]
    pub kind: PhaseKind,
    pub name: &'static str,
}
impl PhaseEvent {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Per-rank record of the phases a distributed engine went through during its last run.
#[derive(Clone, Debug)]
pub struct PhaseLog {
    rank: usize,
    origin: Instant,
    events: Vec<PhaseEvent>,
}
impl PhaseLog {
    pub fn new(rank: usize) -> Self {
        Self { rank, origin: Instant::now(), events: Vec::new() }
    }

    /// Forget all events and start counting time from now.
    pub fn restart(&mut self) {
        self.origin = Instant::now();
        self.events.clear();
    }

    /// Run **phase** and record how long it took.
    pub fn measure<R>(&mut self, kind: PhaseKind, name: &'static str, phase: impl FnOnce() -> R) -> R {
        let start = self.origin.elapsed().as_secs_f64();
        let result = phase();
        let end = self.origin.elapsed().as_secs_f64();
        tracing::trace!(rank = self.rank, phase = name, ?kind, seconds = end - start, "phase done");
        self.events.push(PhaseEvent { rank: self.rank, start, end, kind, name });
        result
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn events(&self) -> &[PhaseEvent] {
        &self.events
    }

    /// Accumulated time per phase kind: `(computation, communication)` in seconds.
    pub fn totals(&self) -> (f64, f64) {
        self.events.iter().fold((0.0, 0.0), |(comp, comm), e| match e.kind {
            PhaseKind::Computation => (comp + e.duration(), comm),
            PhaseKind::Communication => (comp, comm + e.duration()),
        })
    }

    /// Write all events as CSV (`Rank,Start,End,Type,Name`) into **writer**.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        for event in &self.events {
            csv.serialize(event)?;
        }
        csv.flush()?;
        Ok(())
    }
}
