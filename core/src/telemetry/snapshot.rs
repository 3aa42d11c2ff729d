// ## src/telemetry/snapshot.rs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::counters::TelemetryCounters;
use crate::telemetry::timers::{Stage, StageTimes, TelemetryTimer};

/// Immutable telemetry snapshot of one codec operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub parts_composed: u64,
    pub parts_digested: u64,
    pub attachments: u64,
    pub frames_data: u64,
    pub frames_terminator: u64,
    pub bytes_xml: u64,
    pub bytes_attachment: u64,
    pub bytes_plaintext: u64,
    pub bytes_ciphertext: u64,
    pub elapsed: Duration,
    pub stage_times: StageTimes,
}

impl TelemetrySnapshot {
    pub fn from(counters: &TelemetryCounters, timer: &TelemetryTimer) -> Self {
        Self {
            parts_composed: counters.parts_composed,
            parts_digested: counters.parts_digested,
            attachments: counters.attachments,
            frames_data: counters.frames_data,
            frames_terminator: counters.frames_terminator,
            bytes_xml: counters.bytes_xml,
            bytes_attachment: counters.bytes_attachment,
            bytes_plaintext: counters.bytes_plaintext,
            bytes_ciphertext: counters.bytes_ciphertext,
            elapsed: timer.elapsed(),
            stage_times: timer.stage_times.clone(),
        }
    }

    pub fn total_stage_time(&self) -> Duration {
        self.stage_times.total()
    }

    pub fn has_all_stages(&self, expected: &[Stage]) -> bool {
        self.stage_times.has_all(expected)
    }

    /// Internal consistency:
    /// - ciphertext frames never carry less than their plaintext
    /// - stage times fit inside the elapsed window
    pub fn sanity_check(&self) -> bool {
        self.bytes_ciphertext >= self.bytes_plaintext
            && self.total_stage_time() <= self.elapsed
    }
}
