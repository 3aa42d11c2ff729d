//! Challenge/response threading across a request/response pair.
//!
//! Each request carries a fresh challenge; the matching response echoes it
//! in `Response` and brings a new challenge of its own, which the next
//! request echoes back. Conversation ids are assigned by the supplier in the
//! response to InitDialog and repeated on every later message of the
//! dialog. Sequence numbers count requests within a conversation.

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, warn};

use crate::constants::CHALLENGE_LEN;
use crate::fault::FaultCode;
use crate::message::headers::ControlBlock;
use crate::types::{OsciError, Result};

/// Fresh hex-encoded challenge.
pub fn new_challenge() -> String {
    let mut raw = [0u8; CHALLENGE_LEN];
    OsRng.fill_bytes(&mut raw);
    hex::encode(raw)
}

/// Client side of a dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialogState {
    pub conversation_id: Option<String>,
    pub sequence_number: Option<u32>,
    /// Challenge sent with the outstanding request.
    pub challenge: Option<String>,
    /// Supplier challenge to echo in the next request.
    pub response: Option<String>,
    /// The outstanding request went out under transport encryption.
    pub request_encrypted: bool,
}

impl DialogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotate state for the next request and return its control block.
    pub fn prepare_request(&mut self) -> Result<ControlBlock> {
        let sequence_number = match (&self.conversation_id, self.sequence_number) {
            (None, _) => self.sequence_number,
            (Some(_), None) => Some(0),
            (Some(conv), Some(n)) => Some(n.checked_add(1).ok_or_else(|| {
                OsciError::precondition(format!("sequence numbers of conversation {} are exhausted", conv))
            })?),
        };
        let challenge = new_challenge();
        self.sequence_number = sequence_number;
        self.challenge = Some(challenge.clone());
        self.request_encrypted = false;
        Ok(ControlBlock {
            conversation_id: self.conversation_id.clone(),
            sequence_number,
            response: self.response.clone(),
            challenge: Some(challenge),
        })
    }

    /// Note how the outstanding request was sent; a response to an encrypted
    /// request must come back encrypted.
    pub fn record_transport(&mut self, encrypted: bool) {
        self.request_encrypted = encrypted;
    }

    /// Check a response control block against the outstanding challenge and
    /// adopt its conversation id and challenge.
    pub fn accept_response(&mut self, cb: &ControlBlock) -> Result<()> {
        let expected = self
            .challenge
            .as_deref()
            .ok_or_else(|| OsciError::precondition("no request outstanding in this dialog"))?;
        if cb.response.as_deref() != Some(expected) {
            warn!(expected, received = ?cb.response, "dialog response does not echo the challenge");
            return Err(OsciError::parse(FaultCode::DialogMismatch, "response does not echo the request challenge"));
        }
        match (&self.conversation_id, &cb.conversation_id) {
            (Some(ours), Some(theirs)) if ours != theirs => {
                return Err(OsciError::parse(
                    FaultCode::ConversationUnknown,
                    format!("conversation id {} does not match {}", theirs, ours),
                ))
            }
            (Some(_), None) => {
                return Err(OsciError::parse(FaultCode::ConversationUnknown, "response lost the conversation id"))
            }
            _ => {}
        }
        if let (Some(ours), Some(theirs)) = (self.sequence_number, cb.sequence_number) {
            if ours != theirs {
                return Err(OsciError::parse(
                    FaultCode::SequenceNumberInvalid,
                    format!("sequence number {} does not match {}", theirs, ours),
                ));
            }
        }

        if self.conversation_id.is_none() {
            self.conversation_id = cb.conversation_id.clone();
        }
        self.challenge = None;
        self.request_encrypted = false;
        self.response = cb.challenge.clone();
        debug!(conversation = ?self.conversation_id, "dialog response accepted");
        Ok(())
    }

    /// Supplier side: control block of the response to `request`.
    /// `conversation_id` is the id to assign or confirm.
    pub fn respond(request: &ControlBlock, conversation_id: Option<String>) -> ControlBlock {
        ControlBlock {
            conversation_id: conversation_id.or_else(|| request.conversation_id.clone()),
            sequence_number: request.sequence_number,
            response: request.challenge.clone(),
            challenge: Some(new_challenge()),
        }
    }
}
