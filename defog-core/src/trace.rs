//! JSON call-trace side channel.
//!
//! Written by the harness when `debug_output_path` is configured:
//!
//! ```json
//! { "timestamp": "...", "callLog": [...], "summary": { ... } }
//! ```

use crate::harness::CallRecord;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DebugTrace<'a> {
    timestamp: String,
    call_log: &'a [CallRecord],
    summary: Summary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    total_calls: usize,
    successful_calls: usize,
    failed_calls: usize,
}

/// Serialize the call log to `path`.
pub fn write_trace(path: &Path, call_log: &[CallRecord]) -> std::io::Result<()> {
    let successful = call_log.iter().filter(|r| r.error.is_none()).count();
    let trace = DebugTrace {
        timestamp: chrono::Utc::now().to_rfc3339(),
        call_log,
        summary: Summary {
            total_calls: call_log.len(),
            successful_calls: successful,
            failed_calls: call_log.len() - successful,
        },
    };
    let json = serde_json::to_string_pretty(&trace).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
