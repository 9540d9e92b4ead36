// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Unison output parsing and progress accounting.
//!
//! Unison reports what it does as human readable text. Unisync treats a small
//! part of that text as a loose grammar:
//!
//! - __copy__ lines: `Copying X --> Y`, `[BGN] Copying X from A to B`, and
//!   the arrow lines printed while reconciling, e.g., `new file ---->  X`.
//! - __skip__ lines: `Skipping X`, or `skipped: X (reason)`.
//! - __phase__ lines: anything starting with `Reconciling` or `Propagating`.
//!
//! Everything else is ignored. `[END] Copying` lines only mark completion of
//! a `[BGN]` line. In batch mode every item shows up once while reconciling
//! and again while propagating, so progress counts each file only once.

use indicatif::ProgressBar;
use regex::Regex;
use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
    sync::LazyLock,
    time::{Duration, Instant},
};

static COPY_ARROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\[BGN\]\s+)?Copying\s+(.+?)\s+(?:-->|from)\s").unwrap());
static COPY_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\[BGN\]\s+)?Copying\s+(.+?)\s*$").unwrap());
static RECONCILE_ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:new file|changed|deleted|props)?\s*(?:---->|<----|<-\?->|<=\?=>)\s*(?:new file|changed|deleted|props)?\s+(\S.*?)\s*$")
        .unwrap()
});
static SKIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:Skipping|skipped:)\s+(.+?)(?:\s+\(.*\))?\s*$").unwrap());

/// Kind of transfer line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Copy,
    Skip,
}

/// Synchronization phase announced by unison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reconciling,
    Propagating,
}

impl Display for Phase {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Reconciling => fmt.write_str("reconciling changes"),
            Self::Propagating => fmt.write_str("propagating updates"),
        }
    }
}

/// Event recognized from one line of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Transfer { kind: TransferKind, file: String },
    Phase(Phase),
}

/// Recognize one line of unison output.
///
/// Returns `None` for anything outside the known grammar.
pub fn parse_line(line: &str) -> Option<OutputEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("[END]") {
        return None;
    }

    if trimmed.starts_with("Reconciling") {
        return Some(OutputEvent::Phase(Phase::Reconciling));
    }

    if trimmed.starts_with("Propagating") {
        return Some(OutputEvent::Phase(Phase::Propagating));
    }

    let transfer = |kind, file: &str| OutputEvent::Transfer {
        kind,
        file: file.to_string(),
    };

    if let Some(caps) = COPY_ARROW.captures(trimmed).or_else(|| COPY_BARE.captures(trimmed)) {
        return Some(transfer(TransferKind::Copy, &caps[1]));
    }

    if let Some(caps) = SKIP.captures(trimmed) {
        return Some(transfer(TransferKind::Skip, &caps[1]));
    }

    if let Some(caps) = RECONCILE_ARROW.captures(trimmed) {
        return Some(transfer(TransferKind::Copy, &caps[1]));
    }

    None
}

/// Recognize every line of captured output, in order.
pub fn parse_output(output: &str) -> Vec<OutputEvent> {
    output.lines().filter_map(parse_line).collect()
}

/// Progress of one run.
///
/// # Invariant
///
/// - `processed` never exceeds `total`.
#[derive(Debug, Clone)]
pub struct ProgressState {
    total: u64,
    processed: u64,
    current: Option<String>,
    started: Instant,
}

impl ProgressState {
    /// Construct new progress state expecting `total` transfers.
    pub fn new(total: u64) -> Self {
        Self {
            total,
            processed: 0,
            current: None,
            started: Instant::now(),
        }
    }

    /// Construct progress state by counting distinct transferred files.
    pub fn from_events(events: &[OutputEvent]) -> Self {
        let total = events
            .iter()
            .filter_map(|event| match event {
                OutputEvent::Transfer { file, .. } => Some(file.as_str()),
                OutputEvent::Phase(_) => None,
            })
            .collect::<HashSet<_>>()
            .len() as u64;
        Self::new(total)
    }

    /// Record one processed file.
    pub fn advance(&mut self, file: impl Into<String>) {
        self.processed = (self.processed + 1).min(self.total);
        self.current = Some(file.into());
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Completed fraction in `[0, 1]`. Nothing to do counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }

        self.processed as f64 / self.total as f64
    }

    /// Completed percentage in `[0, 100]`.
    pub fn percent(&self) -> u64 {
        (self.fraction() * 100.0).round() as u64
    }
}

/// Replay captured output through a progress bar.
///
/// The bar length is the number of distinct files transferred in the whole
/// output. Phase lines replace the bar message until the next transfer.
pub fn replay(output: &str, bar: &ProgressBar) -> ProgressState {
    let events = parse_output(output);
    let mut state = ProgressState::from_events(&events);
    bar.set_length(state.total().max(1));
    bar.set_position(0);

    let mut seen = HashSet::new();
    for event in events {
        match event {
            OutputEvent::Phase(phase) => bar.set_message(format!("{phase}...")),
            OutputEvent::Transfer { file, .. } => {
                if seen.insert(file.clone()) {
                    state.advance(file);
                    bar.set_position(state.processed());
                }
                bar.set_message(state.current().unwrap_or_default().to_string());
            }
        }
    }

    if state.total() == 0 {
        bar.set_position(1);
    }

    state
}
