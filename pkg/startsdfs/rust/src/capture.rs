// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::Error;

const CHUNK_SIZE: usize = 1024;

/// Printed by the volume service once it is mounted.
pub const READY_MARKER: &str = "SDFS Volume Service Started";
/// Printed by jsvc when a previous instance still owns the pid file.
pub const ALREADY_RUNNING_PREFIX: &str = "Still running according to PID file";

// Past this many bytes, an unmatched trimmed line cannot become a marker.
const LONGEST_MARKER: usize = if READY_MARKER.len() > ALREADY_RUNNING_PREFIX.len() {
    READY_MARKER.len()
} else {
    ALREADY_RUNNING_PREFIX.len()
};

/// Set once either output stream of a launch shows a readiness marker.
#[derive(Debug, Clone, Default)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Still pulling chunks from the source.
    Reading,
    /// A readiness marker was seen; the source is no longer read.
    ReadinessDetected,
    /// Source reached end of input.
    Closed,
    /// Reading the source or writing the sink failed.
    Failed,
}

impl CaptureState {
    pub fn is_terminal(self) -> bool {
        self != CaptureState::Reading
    }

    pub(crate) fn can_transition_to(self, next: CaptureState) -> bool {
        use CaptureState::*;
        matches!(
            (self, next),
            (Reading, ReadinessDetected) | (Reading, Closed) | (Reading, Failed)
        )
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Reading => write!(f, "reading"),
            CaptureState::ReadinessDetected => write!(f, "readiness detected"),
            CaptureState::Closed => write!(f, "closed"),
            CaptureState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug)]
pub enum CaptureOutcome {
    ReadinessDetected,
    Closed,
    Failed(Error),
}

impl CaptureOutcome {
    pub fn state(&self) -> CaptureState {
        match self {
            CaptureOutcome::ReadinessDetected => CaptureState::ReadinessDetected,
            CaptureOutcome::Closed => CaptureState::Closed,
            CaptureOutcome::Failed(_) => CaptureState::Failed,
        }
    }
}

#[derive(Debug)]
pub struct CaptureReport {
    pub stream: Stream,
    /// Everything read from the source, including the chunk with the marker.
    pub captured: Vec<u8>,
    pub outcome: CaptureOutcome,
}

/// True if `line`, trimmed, is one of the readiness markers.
pub fn is_readiness_line(line: &str) -> bool {
    let line = line.trim();
    line == READY_MARKER || line.starts_with(ALREADY_RUNNING_PREFIX)
}

/// Copies one output stream of the child to a sink, watching for readiness.
pub struct StreamCapture {
    stream: Stream,
    running: RunningFlag,
    state: CaptureState,
    captured: Vec<u8>,
    // Bytes of the current, not yet newline-terminated line.
    partial: Vec<u8>,
    // The current line can no longer match a marker.
    dead_line: bool,
}

impl StreamCapture {
    pub fn new(stream: Stream, running: RunningFlag) -> Self {
        Self {
            stream,
            running,
            state: CaptureState::Reading,
            captured: Vec::new(),
            partial: Vec::new(),
            dead_line: false,
        }
    }

    /// Blocks until the source ends, fails, or shows a readiness marker.
    ///
    /// The source is not read again once a marker has been seen.
    pub fn run<R: Read, W: Write>(mut self, mut source: R, mut sink: W) -> CaptureReport {
        let mut buf = [0u8; CHUNK_SIZE];
        let outcome = loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break CaptureOutcome::Closed,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    break CaptureOutcome::Failed(Error::StreamRead {
                        stream: self.stream,
                        source: e,
                    });
                }
            };
            let chunk = &buf[..n];

            self.captured.extend_from_slice(chunk);
            if let Err(e) = sink.write_all(chunk).and_then(|()| sink.flush()) {
                break CaptureOutcome::Failed(Error::StreamWrite {
                    stream: self.stream,
                    source: e,
                });
            }

            if self.scan(chunk) {
                self.running.set();
                break CaptureOutcome::ReadinessDetected;
            }
        };

        self.transition(outcome.state());
        debug!(
            "[{}] capture {} after {} bytes",
            self.stream,
            self.state,
            self.captured.len()
        );

        CaptureReport {
            stream: self.stream,
            captured: self.captured,
            outcome,
        }
    }

    /// Feed a chunk into the line tracker. Completed lines and the pending
    /// partial line are both checked, since a service that prints a marker
    /// and then blocks may never send the newline.
    fn scan(&mut self, chunk: &[u8]) -> bool {
        let mut segments = chunk.split(|&b| b == b'\n').peekable();
        while let Some(segment) = segments.next() {
            if self.extend_line(segment) {
                return true;
            }
            if segments.peek().is_some() {
                self.partial.clear();
                self.dead_line = false;
            }
        }
        false
    }

    /// Append bytes to the current line and check it. Leading whitespace is
    /// dropped, and a line too long to ever match stops being buffered.
    fn extend_line(&mut self, bytes: &[u8]) -> bool {
        if self.dead_line {
            return false;
        }
        self.partial.extend_from_slice(bytes);

        let (lead, dead) = {
            let text = String::from_utf8_lossy(&self.partial);
            if is_readiness_line(&text) {
                return true;
            }
            let rest = text.trim_start();
            (text.len() - rest.len(), rest.len() > LONGEST_MARKER)
        };

        if dead {
            self.partial.clear();
            self.dead_line = true;
        } else {
            self.partial.drain(..lead);
        }
        false
    }

    fn transition(&mut self, next: CaptureState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid capture transition {} -> {next}",
            self.state
        );
        self.state = next;
    }
}
