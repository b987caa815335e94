// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::Error;

/// Directory holding the volume service pid files.
pub const PID_FILE_DIR: &str = "/tmp";

const MAIN_CLASS: &str = "fuse.SDFS.MountSDFS";

/// Fully resolved invocation of the volume service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    /// Check that the executable exists and can be run.
    pub fn verify_entry_point(&self) -> Result<(), Error> {
        let meta = std::fs::metadata(&self.executable).map_err(|e| {
            Error::config(format!(
                "entry point {} is not usable: {e}",
                self.executable.display()
            ))
        })?;
        if !meta.is_file() {
            return Err(Error::config(format!(
                "entry point {} is not a file",
                self.executable.display()
            )));
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if meta.permissions().mode() & 0o111 == 0 {
                return Err(Error::config(format!(
                    "entry point {} is not executable",
                    self.executable.display()
                )));
            }
        }
        Ok(())
    }
}

/// Renders the command line for diagnostics. Tokens containing whitespace are
/// single-quoted so the boundaries stay visible.
impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.executable.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.chars().any(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LaunchSpecBuilder {
    base_path: PathBuf,
    volume: String,
    memory_mb: i64,
    detach_flags: Vec<String>,
    passthrough: Vec<String>,
    env: BTreeMap<String, String>,
}

impl LaunchSpecBuilder {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            volume: String::new(),
            memory_mb: 0,
            detach_flags: Vec::new(),
            passthrough: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = volume.into();
        self
    }

    pub fn memory_mb(mut self, memory_mb: i64) -> Self {
        self.memory_mb = memory_mb;
        self
    }

    pub fn detach_flags(mut self, flags: Vec<String>) -> Self {
        self.detach_flags = flags;
        self
    }

    /// User arguments, forwarded after everything the launcher synthesizes.
    pub fn passthrough(mut self, args: Vec<String>) -> Self {
        self.passthrough = args;
        self
    }

    pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn pid_file(&self) -> PathBuf {
        Path::new(PID_FILE_DIR).join(format!("{}.pid", self.volume))
    }

    pub fn build(self) -> LaunchSpec {
        let base = self.base_path.display().to_string();
        let heap = format!("{}M", self.memory_mb);
        let pid_file = self.pid_file().display().to_string();

        let mut args: Vec<String> = ["-server", "-outfile", "&1", "-errfile", "&2"]
            .into_iter()
            .map(String::from)
            .collect();

        args.push(format!("-Djava.library.path={base}/bin/"));
        args.push("-home".to_string());
        args.push(format!("{base}/bin/jre"));
        args.extend(
            [
                "-Dorg.apache.commons.logging.Log=fuse.logging.FuseLog",
                "-Xss2m",
                "-wait",
                "99999999999",
                "-Dfuse.logging.level=INFO",
                "-Dfile.encoding=UTF-8",
            ]
            .into_iter()
            .map(String::from),
        );
        args.extend(self.detach_flags);
        args.push(format!("-Xmx{heap}"));
        args.push(format!("-Xms{heap}"));
        args.push("-XX:+DisableExplicitGC".to_string());
        args.push("-pidfile".to_string());
        args.push(pid_file);
        args.push("-XX:+UseG1GC".to_string());
        args.push("-Djava.awt.headless=true".to_string());
        args.push("-cp".to_string());
        args.push(format!("{base}/lib/sdfs.jar:{base}/lib/*"));
        args.push(MAIN_CLASS.to_string());
        args.extend(self.passthrough);

        LaunchSpec {
            executable: self.base_path.join("jsvc"),
            args,
            env: self.env,
        }
    }
}
