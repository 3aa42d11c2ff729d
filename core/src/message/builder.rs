//! Fluent construction of outbound messages.
//!
//! Kind-specific rules are checked in `build()`: content only on kinds that
//! carry it, no fault payload outside the fault kind.

use std::collections::HashSet;

use crate::config::OsciConfig;
use crate::fault::{FaultCode, ProtocolFault};
use crate::message::content::{Attachment, ContentContainer};
use crate::message::dialog::{new_challenge, DialogState};
use crate::message::encrypted::EncryptedData;
use crate::message::headers::{ControlBlock, CustomHeader, Feedback, Selection};
use crate::message::kind::MessageKind;
use crate::message::message::OsciMessage;
use crate::message::process_card::ProcessCardBundle;
use crate::roles::Role;
use crate::types::{OsciError, Result};

pub struct MessageBuilder {
    msg: OsciMessage,
    /// First failure of a fluent step, reported by `build()`.
    deferred: Option<OsciError>,
}

impl MessageBuilder {
    /// Non-fault kinds start with a fresh challenge.
    pub fn new(kind: MessageKind) -> Self {
        let mut msg = OsciMessage::new(kind);
        if !kind.is_fault() {
            msg.control_block.challenge = Some(new_challenge());
        }
        Self { msg, deferred: None }
    }

    /// Response to `request`: matching kind, control block echoing the
    /// request challenge with a fresh one of its own.
    pub fn response_to(request: &OsciMessage, conversation_id: Option<String>) -> Result<Self> {
        let kind = request.kind().response_kind().ok_or_else(|| {
            OsciError::precondition(format!("{} is not a request", request.kind()))
        })?;
        let mut b = Self::new(kind);
        b.msg.control_block = DialogState::respond(request.control_block(), conversation_id);
        b.msg.type_header.message_id = request.message_id().map(str::to_string);
        Ok(b)
    }

    /// Fault reply carrying `code`.
    pub fn fault(fault_code: &str, code: FaultCode, message: impl Into<String>) -> Self {
        let mut b = Self::new(MessageKind::Fault);
        b.msg.fault = Some(ProtocolFault {
            fault_code: fault_code.to_string(),
            code: code.as_str(),
            message: message.into(),
        });
        b
    }

    /// Apply configured language preferences (requests only).
    pub fn with_config(mut self, cfg: &OsciConfig) -> Self {
        if self.msg.kind.is_request() && !cfg.desired_languages.is_empty() {
            self.msg.set_desired_languages(cfg.desired_languages.clone());
        }
        self
    }

    pub fn control_block(mut self, cb: ControlBlock) -> Self {
        self.msg.control_block = cb;
        self
    }

    /// Next request of `dialog`.
    pub fn dialog(mut self, dialog: &mut DialogState) -> Self {
        match dialog.prepare_request() {
            Ok(cb) => self.msg.control_block = cb,
            Err(e) => self.deferred = self.deferred.take().or(Some(e)),
        }
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.msg.set_role(role);
        self
    }

    pub fn languages(mut self, languages: Vec<String>) -> Self {
        self.msg.set_desired_languages(languages);
        self
    }

    pub fn feature(mut self, key: impl Into<String>, version: impl Into<String>) -> Self {
        self.msg.add_feature(key, version);
        self
    }

    pub fn custom_header(mut self, header: CustomHeader) -> Self {
        self.msg.custom_headers.push(header);
        self
    }

    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.msg.type_header.message_id = Some(id.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.msg.type_header.subject = Some(subject.into());
        self
    }

    pub fn recipient(mut self, uri: impl Into<String>) -> Self {
        self.msg.type_header.recipient = Some(uri.into());
        self
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.msg.type_header.selection = Some(selection);
        self
    }

    pub fn feedback(mut self, entry: Feedback) -> Self {
        self.msg.type_header.feedback.push(entry);
        self
    }

    pub fn process_card(mut self, bundle: ProcessCardBundle) -> Self {
        self.msg.type_header.process_cards.push(bundle);
        self
    }

    pub fn content(mut self, container: ContentContainer) -> Self {
        self.msg.contents.push(container);
        self
    }

    pub fn encrypted(mut self, data: EncryptedData) -> Self {
        self.msg.encrypted.push(data);
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.msg.attachments.push(attachment);
        self
    }

    pub fn build(self) -> Result<OsciMessage> {
        if let Some(e) = self.deferred {
            return Err(e);
        }
        let msg = self.msg;
        let has_content = !msg.contents.is_empty() || !msg.encrypted.is_empty() || !msg.attachments.is_empty();
        if has_content && !msg.kind.carries_content() {
            return Err(OsciError::precondition(format!("{} carries no content", msg.kind)));
        }
        if msg.fault.is_some() != msg.kind.is_fault() {
            return Err(OsciError::precondition("fault payload and fault kind must go together"));
        }
        {
            let mut seen = HashSet::new();
            if let Some(dup) = msg.attachments.iter().find(|a| !seen.insert(a.ref_id())) {
                return Err(OsciError::precondition(format!("attachment {} added twice", dup.ref_id())));
            }
        }
        Ok(msg)
    }
}
