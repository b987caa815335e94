// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

#![allow(dead_code)]

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A fake SDFS install: `<dir>/jsvc` is a shell script and `<dir>/volume-cfg.xml`
/// the volume configuration.
pub struct FakeInstall {
    dir: tempfile::TempDir,
}

impl FakeInstall {
    /// `jsvc_body` runs under `/bin/sh` with `$DIR` set to the install directory.
    pub fn new(jsvc_body: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let jsvc = dir.path().join("jsvc");
        fs::write(
            &jsvc,
            format!("#!/bin/sh\nDIR=$(dirname \"$0\")\n{jsvc_body}\n"),
        )
        .expect("failed to write fake jsvc");
        fs::set_permissions(&jsvc, fs::Permissions::from_mode(0o755))
            .expect("failed to chmod fake jsvc");

        let install = Self { dir };
        install.write_io_config(0, 0);
        install
    }

    pub fn base_path(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn config_path(&self) -> PathBuf {
        self.path("volume-cfg.xml")
    }

    pub fn write_io_config(&self, max_open_files: i64, max_write_buffers: i64) {
        self.write_config(&format!(
            "<subsystem-config>\n  <io max-open-files=\"{max_open_files}\" \
             max-file-write-buffers=\"{max_write_buffers}\"/>\n</subsystem-config>\n"
        ));
    }

    pub fn write_config(&self, contents: &str) {
        fs::write(self.config_path(), contents).expect("failed to write volume config");
    }

    /// Arguments the fake jsvc recorded with `printf '%s\n' "$@" > "$DIR/args.txt"`.
    pub fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.path("args.txt"))
            .expect("fake jsvc did not record its arguments")
            .lines()
            .map(String::from)
            .collect()
    }

    /// PID the fake jsvc wrote with `echo $$ > "$DIR/child.pid"`.
    pub fn recorded_pid(&self) -> u32 {
        fs::read_to_string(self.path("child.pid"))
            .expect("fake jsvc did not record its pid")
            .trim()
            .parse()
            .expect("child.pid is not a number")
    }
}

pub struct LauncherRun {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl LauncherRun {
    pub fn output(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Run the launcher against `install` and wait for it to exit.
///
/// Output goes to files rather than pipes: a detached service inherits the
/// launcher's descriptors and would keep pipes open long after it exits.
pub fn run_launcher(install: &FakeInstall, args: &[&str], envs: &[(&str, &str)]) -> LauncherRun {
    let out_path = install.path("launcher.out");
    let err_path = install.path("launcher.err");
    let bin = env!("CARGO_BIN_EXE_startsdfs");

    let mut cmd = Command::new(bin);
    cmd.args(args)
        .env("SDFS_BASE_PATH", install.base_path())
        .env_remove("DOCKER_DETATCH")
        .stdin(Stdio::null())
        .stdout(File::create(&out_path).expect("failed to create stdout file"))
        .stderr(File::create(&err_path).expect("failed to create stderr file"));
    for (k, v) in envs {
        cmd.env(k, v);
    }

    let start = Instant::now();
    let mut child = cmd.spawn().expect("failed to start startsdfs");
    let status = loop {
        if let Some(status) = child.try_wait().expect("failed to check launcher status") {
            break status;
        }
        if start.elapsed() >= DEFAULT_TIMEOUT {
            child.kill().ok();
            child.wait().ok();
            panic!("startsdfs did not exit within {DEFAULT_TIMEOUT:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    LauncherRun {
        status,
        stdout: fs::read_to_string(&out_path).unwrap_or_default(),
        stderr: fs::read_to_string(&err_path).unwrap_or_default(),
        elapsed: start.elapsed(),
    }
}

pub fn pid_is_alive(pid: u32) -> bool {
    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

pub fn kill(pid: u32) {
    let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
}
