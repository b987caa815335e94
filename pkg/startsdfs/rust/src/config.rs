// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::Error;

const DEFAULT_BASE_PATH: &str = "/usr/share/sdfs";
const VOLUME_CONFIG_DIR: &str = "/etc/sdfs";

pub const BASE_PATH_ENV: &str = "SDFS_BASE_PATH";
pub const DETACH_ENV: &str = "DOCKER_DETATCH";

/// Sizing-relevant values of a volume configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoConfig {
    pub max_open_files: i64,
    pub max_write_buffers: i64,
}

/// `<subsystem-config>` root. Everything except the `io` element is ignored.
#[derive(Debug, Deserialize)]
struct SubsystemConfig {
    #[serde(default)]
    io: Option<IoElement>,
}

// Attributes are kept as strings so a malformed value degrades to zero
// instead of rejecting the whole document.
#[derive(Debug, Deserialize)]
struct IoElement {
    #[serde(rename = "@max-open-files", default)]
    max_open_files: Option<String>,
    #[serde(rename = "@max-file-write-buffers", default)]
    max_file_write_buffers: Option<String>,
}

fn parse_count(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(|n| n.max(0))
        .unwrap_or(0)
}

pub fn parse_io_config(xml: &str) -> Result<IoConfig, Error> {
    let doc: SubsystemConfig = quick_xml::de::from_str(xml)
        .map_err(|e| Error::config(format!("failed to parse volume configuration: {e}")))?;

    let Some(io) = doc.io else {
        debug!("volume configuration has no <io> element, sizing from zero");
        return Ok(IoConfig::default());
    };

    Ok(IoConfig {
        max_open_files: parse_count(io.max_open_files.as_deref()),
        max_write_buffers: parse_count(io.max_file_write_buffers.as_deref()),
    })
}

pub fn load_io_config(path: &Path) -> Result<IoConfig, Error> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Error Reading {} : {e}", path.display())))?;
    let cfg = parse_io_config(&contents)?;
    debug!(
        "loaded {}: max-open-files={} max-file-write-buffers={}",
        path.display(),
        cfg.max_open_files,
        cfg.max_write_buffers
    );
    Ok(cfg)
}

/// Pick the volume configuration file. A volume name wins over an explicit file.
pub fn volume_config_path(volume: Option<&str>, file: Option<&Path>) -> Result<PathBuf, Error> {
    let path = match (volume, file) {
        (Some(volume), _) => PathBuf::from(format!("{VOLUME_CONFIG_DIR}/{volume}-volume-cfg.xml")),
        (None, Some(file)) => file.to_path_buf(),
        (None, None) => {
            return Err(Error::config(
                "-v or -f must be passed with the name of the volume",
            ));
        }
    };

    if !path.exists() {
        return Err(Error::config(format!(
            "File {} does not exist",
            path.display()
        )));
    }
    Ok(path)
}

pub fn base_path() -> PathBuf {
    base_path_from(std::env::var(BASE_PATH_ENV).ok())
}

fn base_path_from(value: Option<String>) -> PathBuf {
    value
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_PATH))
}

/// Extra jsvc flags requested through the environment, one token per flag.
pub fn detach_flags() -> Vec<String> {
    detach_flags_from(std::env::var(DETACH_ENV).ok())
}

fn detach_flags_from(value: Option<String>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(String::from).collect())
        .unwrap_or_default()
}
