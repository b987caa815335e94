// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Launcher for the SDFS volume service.
//!
//! Sizes the JVM heap from the volume configuration, starts the service under
//! jsvc, mirrors its output, and returns once the service reports readiness
//! or exits.

pub mod capture;
pub mod cli;
pub mod config;
mod error;
pub mod launch;
pub mod sizing;
pub mod supervisor;

pub use error::{Error, ExitCause};
