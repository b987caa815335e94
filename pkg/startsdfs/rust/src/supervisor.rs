// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread;

use log::{debug, info, warn};

use crate::Error;
use crate::capture::{CaptureOutcome, CaptureReport, RunningFlag, Stream, StreamCapture};
use crate::error::ExitCause;
use crate::launch::LaunchSpec;

type Sink = Box<dyn Write + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Launch spec accepted, child not spawned yet.
    NotStarted,
    /// Child spawned, captures in flight.
    Running,
    /// A readiness marker was seen; the child is left to run on its own.
    ReadinessObserved,
    /// Both streams closed without readiness and the child was reaped.
    Exited,
    /// The child could not be spawned.
    StartFailed,
}

impl SupervisorState {
    pub(crate) fn can_transition_to(self, next: SupervisorState) -> bool {
        use SupervisorState::*;
        matches!(
            (self, next),
            (NotStarted, Running)
                | (NotStarted, StartFailed)
                | (Running, ReadinessObserved)
                | (Running, Exited)
        )
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::NotStarted => write!(f, "not started"),
            SupervisorState::Running => write!(f, "running"),
            SupervisorState::ReadinessObserved => write!(f, "readiness observed"),
            SupervisorState::Exited => write!(f, "exited"),
            SupervisorState::StartFailed => write!(f, "start failed"),
        }
    }
}

/// How a successful supervision ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The service signalled readiness and now runs without the launcher.
    ReadinessObserved { pid: u32 },
    /// The child exited cleanly without ever signalling readiness.
    Exited(ExitStatus),
}

/// Runs one launch of the volume service.
pub struct Supervisor {
    spec: LaunchSpec,
    running: RunningFlag,
    state: SupervisorState,
    stdout_sink: Sink,
    stderr_sink: Sink,
}

impl Supervisor {
    /// Mirror the child's output onto this process's stdout and stderr.
    pub fn new(spec: LaunchSpec) -> Self {
        Self {
            spec,
            running: RunningFlag::new(),
            state: SupervisorState::NotStarted,
            stdout_sink: Box::new(io::stdout()),
            stderr_sink: Box::new(io::stderr()),
        }
    }

    pub fn with_sinks(
        mut self,
        stdout: impl Write + Send + 'static,
        stderr: impl Write + Send + 'static,
    ) -> Self {
        self.stdout_sink = Box::new(stdout);
        self.stderr_sink = Box::new(stderr);
        self
    }

    pub fn running_flag(&self) -> RunningFlag {
        self.running.clone()
    }

    /// Spawn the child and supervise it until readiness or exit.
    pub fn run(mut self) -> Result<Outcome, Error> {
        let mut child = match self.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.transition(SupervisorState::StartFailed);
                return Err(Error::StartFailed {
                    command: self.spec.to_string(),
                    source,
                });
            }
        };
        self.transition(SupervisorState::Running);
        let pid = child.id();
        info!(
            "[supervisor] spawned (pid={pid}, cmd={})",
            self.spec.executable.display()
        );

        let (tx, rx) = mpsc::channel();
        let stdout_sink = std::mem::replace(&mut self.stdout_sink, Box::new(io::sink()));
        let stderr_sink = std::mem::replace(&mut self.stderr_sink, Box::new(io::sink()));
        self.start_capture(Stream::Stdout, child.stdout.take(), stdout_sink, tx.clone())?;
        self.start_capture(Stream::Stderr, child.stderr.take(), stderr_sink, tx)?;

        let mut pending = 2;
        while pending > 0 {
            let Ok(report) = rx.recv() else {
                warn!("[supervisor] capture threads went away without reporting");
                break;
            };
            pending -= 1;
            if let Err(e) = self.on_report(report) {
                if let Some(status) = reap_if_exited(&mut child) {
                    info!("[supervisor] pid {pid} exited with {status}");
                } else {
                    warn!("[supervisor] leaving pid {pid} running after capture failure");
                }
                return Err(e);
            }

            // Whichever capture is still reading is abandoned from here on.
            if self.running.is_set() {
                return Ok(self.detach(&mut child, pending));
            }
        }

        self.wait_for_exit(&mut child)
    }

    fn spawn(&self) -> io::Result<Child> {
        Command::new(&self.spec.executable)
            .args(&self.spec.args)
            .envs(&self.spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }

    fn start_capture<R: Read + Send + 'static>(
        &self,
        stream: Stream,
        source: Option<R>,
        sink: Sink,
        tx: Sender<CaptureReport>,
    ) -> Result<(), Error> {
        let source = source.ok_or_else(|| Error::StreamRead {
            stream,
            source: io::Error::other("stream was not piped"),
        })?;
        let capture = StreamCapture::new(stream, self.running.clone());

        // The handle is dropped on purpose: completion is reported over `tx`,
        // and a detached launch never joins the remaining capture.
        thread::Builder::new()
            .name(format!("capture-{stream}"))
            .spawn(move || {
                let report = capture.run(source, sink);
                if tx.send(report).is_err() {
                    debug!("[{stream}] supervisor no longer listening");
                }
            })
            .map_err(|source| Error::StreamRead { stream, source })?;
        Ok(())
    }

    fn on_report(&self, report: CaptureReport) -> Result<(), Error> {
        match report.outcome {
            CaptureOutcome::ReadinessDetected => {
                info!("[{}] readiness marker observed", report.stream);
                Ok(())
            }
            CaptureOutcome::Closed => {
                debug!(
                    "[{}] closed after {} bytes",
                    report.stream,
                    report.captured.len()
                );
                Ok(())
            }
            CaptureOutcome::Failed(e) => {
                warn!("[{}] capture failed: {e}", report.stream);
                Err(e)
            }
        }
    }

    fn detach(&mut self, child: &mut Child, pending: usize) -> Outcome {
        self.transition(SupervisorState::ReadinessObserved);
        let pid = child.id();
        if pending > 0 {
            debug!("[supervisor] detaching {pending} capture(s) still reading");
        }

        match reap_if_exited(child) {
            Some(status) => info!("[supervisor] pid {pid} handed off and exited with {status}"),
            None => info!("[supervisor] pid {pid} handed off, running in background"),
        }
        Outcome::ReadinessObserved { pid }
    }

    fn wait_for_exit(&mut self, child: &mut Child) -> Result<Outcome, Error> {
        let status = child.wait().map_err(|e| Error::ExitFailure {
            command: self.spec.to_string(),
            cause: ExitCause::Wait(e),
        });
        self.transition(SupervisorState::Exited);

        let status = status?;
        info!("[supervisor] pid {} exited with {status}", child.id());
        if !status.success() {
            return Err(Error::ExitFailure {
                command: self.spec.to_string(),
                cause: ExitCause::Status(status),
            });
        }
        Ok(Outcome::Exited(status))
    }

    fn transition(&mut self, next: SupervisorState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid supervisor transition {} -> {next}",
            self.state
        );
        debug!("[supervisor] {} -> {next}", self.state);
        self.state = next;
    }
}

/// Reap the child only if it is already gone; a running service is left alone.
fn reap_if_exited(child: &mut Child) -> Option<ExitStatus> {
    match child.try_wait() {
        Ok(status) => status,
        Err(e) => {
            warn!("[supervisor] could not poll pid {}: {e}", child.id());
            None
        }
    }
}
