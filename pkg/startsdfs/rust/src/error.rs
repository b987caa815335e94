// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;
use std::io;
use std::process::ExitStatus;

use thiserror::Error;

use crate::capture::Stream;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to start `{command}`: {source}")]
    StartFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to forward {stream} of child process: {source}")]
    StreamWrite {
        stream: Stream,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {stream} of child process: {source}")]
    StreamRead {
        stream: Stream,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed: {cause}")]
    ExitFailure { command: String, cause: ExitCause },
}

/// Why a child that never signalled readiness counts as failed.
#[derive(Debug)]
pub enum ExitCause {
    Status(ExitStatus),
    Wait(io::Error),
}

impl fmt::Display for ExitCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCause::Status(status) => write!(f, "{status}"),
            ExitCause::Wait(e) => write!(f, "waiting for exit: {e}"),
        }
    }
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
