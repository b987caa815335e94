// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;

use clap::Parser;

/// Flags of the mount command. Apart from `-v`, `-f`, `-z`, `-d`, `-h` and
/// `--version` they are only validated here; every argument is forwarded to
/// the volume service unchanged.
#[derive(Parser, Debug)]
#[command(
    name = "startsdfs",
    about = "Mount an SDFS volume under jsvc",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Args {
    /// Volume to mount.
    #[arg(short = 'v', value_name = "VOLUME")]
    pub volume: Option<String>,

    /// sdfs volume configuration file to mount, e.g. /etc/sdfs/dedup-volume-cfg.xml
    #[arg(short = 'f', value_name = "FILE")]
    pub volume_file: Option<PathBuf>,

    /// Heap size in MB, overrides sizing from the volume configuration.
    #[arg(short = 'z', value_name = "MB")]
    pub memory: Option<i64>,

    /// The version of this build.
    #[arg(long = "version")]
    pub version: bool,

    /// fuse mount options.
    #[arg(
        short = 'o',
        value_name = "OPTIONS",
        default_value = "direct_io,big_writes,allow_other,fsname=SDFS"
    )]
    pub mount_options: Option<String>,

    /// Restores files from cloud storage if the backend cloud store supports it.
    #[arg(short = 'r')]
    pub restore: bool,

    /// Debug output.
    #[arg(short = 'd')]
    pub debug: bool,

    /// Port to use for sdfs cli. Range checks are left to the service.
    #[arg(short = 'p', value_name = "PORT", default_value_t = 6442)]
    pub port: i64,

    /// Compact volume on disk.
    #[arg(short = 'l')]
    pub compact: bool,

    /// Runs consistency check.
    #[arg(short = 'c')]
    pub consistency_check: bool,

    /// Password to decrypt config.
    #[arg(short = 'e', value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Disable drive mount.
    #[arg(short = 'n')]
    pub no_mount: bool,

    /// Mount point for SDFS file system, e.g. /media/dedup
    #[arg(short = 'm', value_name = "MOUNT_POINT")]
    pub mount_point: Option<PathBuf>,

    /// Displays available options.
    #[arg(short = 'h')]
    pub help: bool,

    /// If set ssl will not be used for sdfscli traffic.
    #[arg(short = 's')]
    pub no_ssl: bool,

    /// Sync with all files in cloud.
    #[arg(short = 'w')]
    pub sync: bool,

    /// Use console logging.
    #[arg(short = 'q')]
    pub console_logging: bool,
}

// Short flags that consume the following token as their value.
const VALUE_FLAGS: &[&str] = &["-v", "-f", "-z", "-o", "-p", "-e", "-m"];

impl Args {
    /// Parse a full argv. A bare `-version` is accepted as `--version`, as
    /// long as it is not the value of a preceding flag.
    pub fn from_argv(argv: &[String]) -> Self {
        Self::parse_from(normalize(argv))
    }

    /// Volume name used for the pid file. Empty when only `-f` was given.
    pub fn volume_name(&self) -> &str {
        self.volume.as_deref().unwrap_or_default()
    }
}

fn normalize(argv: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(argv.len());
    let mut expects_value = false;
    for (i, arg) in argv.iter().enumerate() {
        if i > 0 && !expects_value && arg == "-version" {
            out.push("--version".to_string());
        } else {
            out.push(arg.clone());
        }
        expects_value = i > 0 && !expects_value && VALUE_FLAGS.contains(&arg.as_str());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("startsdfs").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_volume_and_memory() {
        let args = parse(&["-v", "pool0", "-z", "8192"]);
        assert_eq!(args.volume.as_deref(), Some("pool0"));
        assert_eq!(args.memory, Some(8192));
        assert_eq!(args.volume_name(), "pool0");
        assert!(!args.debug);
    }

    #[test]
    fn test_memory_absent_when_not_passed() {
        let args = parse(&["-f", "/etc/sdfs/dedup-volume-cfg.xml"]);
        assert_eq!(args.memory, None);
        assert_eq!(
            args.volume_file,
            Some(PathBuf::from("/etc/sdfs/dedup-volume-cfg.xml"))
        );
        assert_eq!(args.volume_name(), "");
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["-v", "pool0"]);
        assert_eq!(args.port, 6442);
        assert_eq!(
            args.mount_options.as_deref(),
            Some("direct_io,big_writes,allow_other,fsname=SDFS")
        );
    }

    #[test]
    fn test_service_flags() {
        let args = parse(&[
            "-v", "pool0", "-m", "/media/pool0", "-d", "-r", "-n", "-s", "-w", "-q", "-l", "-c",
            "-e", "secret", "-p", "7000",
        ]);
        assert!(args.debug && args.restore && args.no_mount && args.no_ssl);
        assert!(args.sync && args.console_logging && args.compact && args.consistency_check);
        assert_eq!(args.password.as_deref(), Some("secret"));
        assert_eq!(args.port, 7000);
        assert_eq!(args.mount_point, Some(PathBuf::from("/media/pool0")));
    }

    #[test]
    fn test_help_and_version_are_plain_flags() {
        assert!(parse(&["-h"]).help);
        assert!(parse(&["--version"]).version);
    }

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("startsdfs")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_single_dash_version() {
        let args = Args::from_argv(&argv(&["-version"]));
        assert!(args.version);
        assert_eq!(args.volume, None);
    }

    #[test]
    fn test_version_as_flag_value_is_kept() {
        assert_eq!(
            normalize(&argv(&["-e", "-version"])),
            argv(&["-e", "-version"])
        );
        assert_eq!(
            normalize(&argv(&["-v", "pool0", "-version"])),
            argv(&["-v", "pool0", "--version"])
        );
    }

    #[test]
    fn test_port_out_of_u16_range_is_forwarded() {
        assert_eq!(parse(&["-v", "pool0", "-p", "70000"]).port, 70000);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let result = Args::try_parse_from(["startsdfs", "-v", "pool0", "--bogus"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_memory_must_be_numeric() {
        let result = Args::try_parse_from(["startsdfs", "-z", "lots"]);
        assert!(result.is_err());
    }
}
