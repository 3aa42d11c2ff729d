// ### `src/telemetry/counters.rs`

//! telemetry/counters.rs
//! Mutable counters collected while composing, parsing, or enciphering.
//!
//! Converted into an immutable TelemetrySnapshot when the operation ends.
use bincode::{Decode, Encode};
use std::ops::AddAssign;

/// Deterministic counters collected during one message operation.
#[derive(Default, Clone, Debug, Encode, Decode, PartialEq)]
pub struct TelemetryCounters {
    pub parts_composed: u64,
    pub parts_digested: u64,
    pub attachments: u64,
    pub frames_data: u64,
    pub frames_terminator: u64,
    pub bytes_xml: u64,
    pub bytes_attachment: u64,
    pub bytes_plaintext: u64,
    pub bytes_ciphertext: u64,
}

impl TelemetryCounters {
    /// Record one part placed into the header/body sequence.
    pub fn add_part(&mut self) {
        self.parts_composed += 1;
    }

    /// Record one digest finalized (sign side or parse side).
    pub fn add_digest(&mut self) {
        self.parts_digested += 1;
    }

    pub fn add_xml(&mut self, len: usize) {
        self.bytes_xml += len as u64;
    }

    /// Record one attachment streamed through the codec.
    pub fn add_attachment(&mut self, len: u64) {
        self.attachments += 1;
        self.bytes_attachment += len;
    }

    /// Record one sealed or opened data frame.
    ///
    /// - `pt_len`: plaintext bytes carried by the frame
    /// - `ct_len`: ciphertext bytes including the tag
    pub fn add_frame(&mut self, pt_len: usize, ct_len: usize) {
        self.frames_data += 1;
        self.bytes_plaintext += pt_len as u64;
        self.bytes_ciphertext += ct_len as u64;
    }

    /// Mark a terminator frame processed.
    pub fn add_terminator(&mut self, ct_len: usize) {
        self.frames_terminator += 1;
        self.bytes_ciphertext += ct_len as u64;
    }

    pub fn merge(&mut self, other: &TelemetryCounters) {
        self.parts_composed += other.parts_composed;
        self.parts_digested += other.parts_digested;
        self.attachments += other.attachments;
        self.frames_data += other.frames_data;
        self.frames_terminator += other.frames_terminator;

        self.bytes_xml += other.bytes_xml;
        self.bytes_attachment += other.bytes_attachment;
        self.bytes_plaintext += other.bytes_plaintext;
        self.bytes_ciphertext += other.bytes_ciphertext;
    }
}

impl AddAssign for TelemetryCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}
