//! The message object shared by all kinds.

use tracing::trace;

use crate::fault::ProtocolFault;
use crate::message::content::{Attachment, ContentContainer};
use crate::message::encrypted::{EncryptedData, OpenedContent};
use crate::message::headers::{ControlBlock, CustomHeader, DesiredLanguages, Feature, FeatureDescription, Feedback, TypeHeader};
use crate::message::kind::MessageKind;
use crate::message::parts::PartSet;
use crate::message::process_card::ProcessCardBundle;
use crate::roles::{Certificate, Decrypter, Role, RoleKind};
use crate::signature::{CapturedDigests, SignatureBlock};
use crate::telemetry::{TelemetryCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::{OsciError, Result};

/// Lifecycle of a message. Mutating a composed or signed message drops it
/// back to `Built`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Built,
    Composed,
    Signed,
    Parsed,
}

#[derive(Debug)]
pub struct OsciMessage {
    pub(crate) kind: MessageKind,
    pub(crate) state: MessageState,
    pub(crate) control_block: ControlBlock,
    pub(crate) desired_languages: Option<DesiredLanguages>,
    pub(crate) features: Option<FeatureDescription>,
    pub(crate) originator: Option<Role>,
    pub(crate) addressee: Option<Role>,
    pub(crate) intermediary: Option<Role>,
    pub(crate) authors: Vec<Role>,
    pub(crate) readers: Vec<Role>,
    pub(crate) custom_headers: Vec<CustomHeader>,
    pub(crate) type_header: TypeHeader,
    pub(crate) contents: Vec<ContentContainer>,
    pub(crate) encrypted: Vec<EncryptedData>,
    pub(crate) attachments: Vec<Attachment>,
    pub(crate) fault: Option<ProtocolFault>,
    pub(crate) parts: Option<PartSet>,
    pub(crate) signature: Option<SignatureBlock>,
    pub(crate) captured: Option<CapturedDigests>,
    pub(crate) signature_verified: bool,
    pub(crate) counters: TelemetryCounters,
    pub(crate) timer: TelemetryTimer,
    pub(crate) telemetry: Option<TelemetrySnapshot>,
    pub(crate) transport_encrypted: bool,
}

impl OsciMessage {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            state: MessageState::Built,
            control_block: ControlBlock::default(),
            desired_languages: None,
            features: None,
            originator: None,
            addressee: None,
            intermediary: None,
            authors: Vec::new(),
            readers: Vec::new(),
            custom_headers: Vec::new(),
            type_header: TypeHeader::default(),
            contents: Vec::new(),
            encrypted: Vec::new(),
            attachments: Vec::new(),
            fault: None,
            parts: None,
            signature: None,
            captured: None,
            signature_verified: false,
            counters: TelemetryCounters::default(),
            timer: TelemetryTimer::new(),
            telemetry: None,
            transport_encrypted: false,
        }
    }

    /// Drop composed parts and any signature after a mutation.
    fn touch(&mut self) {
        if self.state != MessageState::Built {
            trace!(kind = %self.kind, from = ?self.state, "message mutated, back to built");
        }
        self.state = MessageState::Built;
        self.parts = None;
        self.signature = None;
        self.signature_verified = false;
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    pub fn control_block(&self) -> &ControlBlock {
        &self.control_block
    }

    pub fn set_control_block(&mut self, cb: ControlBlock) {
        self.control_block = cb;
        self.touch();
    }

    pub fn desired_languages(&self) -> Option<&DesiredLanguages> {
        self.desired_languages.as_ref()
    }

    pub fn set_desired_languages(&mut self, languages: Vec<String>) {
        self.desired_languages = if languages.is_empty() { None } else { Some(DesiredLanguages { languages }) };
        self.touch();
    }

    pub fn features(&self) -> &[Feature] {
        self.features.as_ref().map(|f| f.features.as_slice()).unwrap_or(&[])
    }

    pub fn add_feature(&mut self, key: impl Into<String>, version: impl Into<String>) {
        self.features
            .get_or_insert_with(FeatureDescription::default)
            .features
            .push(Feature { key: key.into(), version: version.into() });
        self.touch();
    }

    /// Set a role. Authors and readers accumulate; other kinds replace.
    pub fn set_role(&mut self, role: Role) {
        match role.kind {
            RoleKind::Originator => self.originator = Some(role),
            RoleKind::Addressee => self.addressee = Some(role),
            RoleKind::Intermediary => self.intermediary = Some(role),
            RoleKind::Author => self.authors.push(role),
            RoleKind::Reader => self.readers.push(role),
        }
        self.touch();
    }

    pub fn originator(&self) -> Option<&Role> {
        self.originator.as_ref()
    }

    pub fn addressee(&self) -> Option<&Role> {
        self.addressee.as_ref()
    }

    pub fn intermediary(&self) -> Option<&Role> {
        self.intermediary.as_ref()
    }

    pub fn authors(&self) -> &[Role] {
        &self.authors
    }

    pub fn readers(&self) -> &[Role] {
        &self.readers
    }

    pub fn custom_headers(&self) -> &[CustomHeader] {
        &self.custom_headers
    }

    pub fn add_custom_header(&mut self, header: CustomHeader) {
        self.custom_headers.push(header);
        self.touch();
    }

    pub fn type_header(&self) -> &TypeHeader {
        &self.type_header
    }

    pub fn type_header_mut(&mut self) -> &mut TypeHeader {
        self.touch();
        &mut self.type_header
    }

    pub fn message_id(&self) -> Option<&str> {
        self.type_header.message_id.as_deref()
    }

    pub fn feedback(&self) -> &[Feedback] {
        &self.type_header.feedback
    }

    pub fn process_cards(&self) -> &[ProcessCardBundle] {
        &self.type_header.process_cards
    }

    pub fn contents(&self) -> &[ContentContainer] {
        &self.contents
    }

    /// Container with `ref_id`, searching nested containers too.
    pub fn content(&self, ref_id: &str) -> Option<&ContentContainer> {
        self.contents.iter().find_map(|c| c.find(ref_id))
    }

    pub fn add_content(&mut self, container: ContentContainer) {
        self.contents.push(container);
        self.touch();
    }

    pub fn encrypted(&self) -> &[EncryptedData] {
        &self.encrypted
    }

    pub fn add_encrypted(&mut self, data: EncryptedData) {
        self.encrypted.push(data);
        self.touch();
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn attachment(&self, ref_id: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.ref_id() == ref_id)
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
        self.touch();
    }

    /// Mutable access for sealing content containers.
    pub fn attachments_mut(&mut self) -> &mut [Attachment] {
        self.touch();
        &mut self.attachments
    }

    pub fn fault(&self) -> Option<&ProtocolFault> {
        self.fault.as_ref()
    }

    pub fn set_fault(&mut self, fault: ProtocolFault) {
        self.fault = Some(fault);
        self.touch();
    }

    /// Surface a peer fault as a typed error.
    pub fn check_fault(&self) -> Result<()> {
        match &self.fault {
            Some(f) => Err(OsciError::Fault(f.clone())),
            None => Ok(()),
        }
    }

    pub fn parts(&self) -> Option<&PartSet> {
        self.parts.as_ref()
    }

    pub fn signature(&self) -> Option<&SignatureBlock> {
        self.signature.as_ref()
    }

    /// Digests captured while parsing.
    pub fn captured_digests(&self) -> Option<&CapturedDigests> {
        self.captured.as_ref()
    }

    /// A signature is attached and, for parsed messages, verified.
    pub fn is_signed(&self) -> bool {
        match self.state {
            MessageState::Signed => self.signature.is_some(),
            MessageState::Parsed => self.signature.is_some() && self.signature_verified,
            MessageState::Built | MessageState::Composed => false,
        }
    }

    /// Whether a parsed signature went through verification.
    pub fn is_signature_verified(&self) -> bool {
        self.signature_verified
    }

    pub fn signer_certificate(&self) -> Option<&Certificate> {
        self.signature.as_ref().map(|s| &s.certificate)
    }

    /// Arrived inside the transport encryption envelope.
    pub fn is_transport_encrypted(&self) -> bool {
        self.transport_encrypted
    }

    /// Snapshot of the last serialize or parse.
    pub fn telemetry(&self) -> Option<&TelemetrySnapshot> {
        self.telemetry.as_ref()
    }

    pub(crate) fn take_snapshot(&mut self) {
        self.timer.finish();
        self.telemetry = Some(TelemetrySnapshot::from(&self.counters, &self.timer));
    }

    /// Open every encrypted data entry addressed to `decrypter`.
    pub fn open_encrypted(&self, decrypter: &dyn Decrypter) -> Result<Vec<OpenedContent>> {
        self.encrypted
            .iter()
            .filter(|e| e.is_addressed_to(decrypter.cipher_certificate()))
            .map(|e| e.open(decrypter, &self.attachments))
            .collect()
    }

    /// Cipher certificate of the role in position `kind` (first author or reader).
    pub fn role_certificate(&self, kind: RoleKind) -> Option<&Certificate> {
        let role = match kind {
            RoleKind::Originator => self.originator.as_ref(),
            RoleKind::Addressee => self.addressee.as_ref(),
            RoleKind::Intermediary => self.intermediary.as_ref(),
            RoleKind::Author => self.authors.first(),
            RoleKind::Reader => self.readers.first(),
        };
        role.and_then(|r| r.cipher_certificate.as_ref())
    }
}
