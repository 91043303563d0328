//! Append-only diagnostic record of one load-attach-invoke cycle.

use std::fmt;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Load,
    BaseAttach,
    FullAttach,
    Invoke,
    FollowUp,
    Storage,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Load => "load",
            Phase::BaseAttach => "base-attach",
            Phase::FullAttach => "full-attach",
            Phase::Invoke => "invoke",
            Phase::FollowUp => "follow-up",
            Phase::Storage => "storage",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Degraded,
    Failed,
}

impl Status {
    fn tag(&self) -> &'static str {
        match self {
            Status::Ok => "[OK]",
            Status::Degraded => "[WARN]",
            Status::Failed => "[FAIL]",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub phase: Phase,
    pub status: Status,
    pub message: String,
}

/// Continuation lines of a multi-line message are indented under the first.
impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = self.message.lines();
        write!(
            f,
            "{} {}: {}",
            self.status.tag(),
            self.phase.as_str(),
            lines.next().unwrap_or("")
        )?;
        for line in lines {
            write!(f, "\n    {line}")?;
        }
        Ok(())
    }
}

/// Entries are only ever appended; there is no way to edit or drop one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, phase: Phase, status: Status, message: impl Into<String>) {
        self.entries.push(TraceEntry {
            phase,
            status,
            message: message.into(),
        });
    }

    pub fn ok(&mut self, phase: Phase, message: impl Into<String>) {
        self.record(phase, Status::Ok, message);
    }

    pub fn degraded(&mut self, phase: Phase, message: impl Into<String>) {
        self.record(phase, Status::Degraded, message);
    }

    pub fn failed(&mut self, phase: Phase, message: impl Into<String>) {
        self.record(phase, Status::Failed, message);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn in_phase(&self, phase: Phase) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(move |e| e.phase == phase)
    }

    pub fn has_failure(&self) -> bool {
        self.entries.iter().any(|e| e.status == Status::Failed)
    }

    /// Ordered human-readable rendering, one entry per line.
    pub fn render(&self) -> String {
        self.entries.iter().map(|entry| format!("{entry}\n")).collect()
    }
}
