// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::Path;

use log::info;

use crate::Error;
use crate::config::{self, IoConfig};

/// Heap every volume gets before write buffers are accounted for.
pub const BASE_MEMORY_MB: i64 = 4000;

/// Upper bound applied to `max-file-write-buffers` before sizing.
pub const MAX_WRITE_BUFFERS: i64 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    pub base_mb: i64,
    pub derived_mb: i64,
}

impl MemoryBudget {
    pub fn total_mb(&self) -> i64 {
        self.base_mb.saturating_add(self.derived_mb)
    }
}

/// Size the heap from the configured open-file and write-buffer limits.
///
/// Each open file may hold up to `max_write_buffers` buffers of 2 MB, with the
/// buffer count capped at [`MAX_WRITE_BUFFERS`].
pub fn compute(cfg: &IoConfig, base_mb: i64) -> MemoryBudget {
    let buffers = cfg.max_write_buffers.clamp(0, MAX_WRITE_BUFFERS);
    let open_files = cfg.max_open_files.max(0);
    MemoryBudget {
        base_mb,
        derived_mb: buffers.saturating_mul(open_files).saturating_mul(2),
    }
}

/// Heap size in MB for this launch.
///
/// An explicit value is used verbatim and the configuration file is never
/// opened.
pub fn resolve_memory(explicit: Option<i64>, config_path: &Path) -> Result<i64, Error> {
    if let Some(mb) = explicit {
        info!("using explicit heap size of {mb}M");
        return Ok(mb);
    }

    let cfg = config::load_io_config(config_path)?;
    let budget = compute(&cfg, BASE_MEMORY_MB);
    info!(
        "sized heap at {}M ({}M base + {}M write buffers)",
        budget.total_mb(),
        budget.base_mb,
        budget.derived_mb
    );
    Ok(budget.total_mb())
}
