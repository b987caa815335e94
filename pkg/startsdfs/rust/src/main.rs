// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use clap::CommandFactory;
use log::{error, info};

use startsdfs::cli::Args;
use startsdfs::launch::LaunchSpecBuilder;
use startsdfs::supervisor::{Outcome, Supervisor};
use startsdfs::{config, sizing};

const BUILD_DATE: &str = match option_env!("BUILD_DATE") {
    Some(date) => date,
    None => "NAN",
};

#[allow(clippy::print_stdout, clippy::print_stderr)]
fn main() -> Result<()> {
    let argv: Vec<String> = std::env::args().collect();
    let args = Args::from_argv(&argv);

    if args.version {
        println!("Version : {}", env!("CARGO_PKG_VERSION"));
        println!("Build Date: {BUILD_DATE}");
        return Ok(());
    }
    if args.help {
        eprintln!("Usage of {}:", argv.first().map_or("startsdfs", String::as_str));
        eprint!("{}", Args::command().render_help());
        std::process::exit(1);
    }

    let level = if args.debug {
        log::Level::Debug
    } else {
        log::Level::Warn
    };
    simple_logger::init_with_level(level)?;

    let config_path =
        config::volume_config_path(args.volume.as_deref(), args.volume_file.as_deref())?;
    let memory_mb = sizing::resolve_memory(args.memory, &config_path)
        .with_context(|| format!("sizing heap from {}", config_path.display()))?;

    let spec = LaunchSpecBuilder::new(config::base_path())
        .volume(args.volume_name())
        .memory_mb(memory_mb)
        .detach_flags(config::detach_flags())
        .passthrough(argv.iter().skip(1).cloned().collect())
        .build();
    info!("command: {spec}");

    let result = spec
        .verify_entry_point()
        .and_then(|()| Supervisor::new(spec.clone()).run());
    match result {
        Ok(Outcome::ReadinessObserved { pid }) => {
            info!("volume service started (pid={pid})");
            Ok(())
        }
        Ok(Outcome::Exited(status)) => {
            info!("volume service exited with {status}");
            Ok(())
        }
        Err(e) => {
            error!("command: {spec}");
            Err(e.into())
        }
    }
}
