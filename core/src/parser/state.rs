//! Structural parser: an explicit stack of frames driven by XML events.
//!
//! The top frame owns the next event. Envelope, header and body frames
//! dispatch child elements to sub-parser frames; a sub-parser frame pops
//! itself when its root element closes and its result is stored on the
//! message under construction. Every event is shown to the digest collector
//! before the frames see it.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::constants::{ns, SCHEMA_ENCRYPTED};
use crate::fault::FaultCode;
use crate::message::{Attachment, CipherPayload, CustomHeader, EncryptedData, MessageKind, OsciMessage};
use crate::parser::collector::DigestCollector;
use crate::parser::content::{ContainerHandler, EncryptedDataHandler, FaultHandler};
use crate::parser::headers::{
    roles_from_entries, CertificatesHandler, ControlBlockHandler, FeaturesHandler, LanguagesHandler,
    TypeHeaderHandler,
};
use crate::parser::signature::{reference_algorithms, SignatureHandler};
use crate::parser::subtree::Subtree;
use crate::roles::{Role, RoleKind};
use crate::types::{OsciError, Result};
use crate::xml::{Canonicalizer, StartTag, XmlEvent};

/// Headers every kind may carry besides its type and signature header.
const SHARED_HEADERS: &[&str] = &[
    "ControlBlock",
    "DesiredLanguages",
    "FeatureDescription",
    "IntermediaryCertificates",
    "NonIntermediaryCertificates",
];

/// What the envelope's schema identifier announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnvelopeKind {
    Message(MessageKind),
    /// Transport encryption envelope around an inner message.
    Encrypted,
}

enum Frame {
    Document,
    Envelope,
    Header,
    Body,
    ContentPackage,
    ControlBlock(Subtree<ControlBlockHandler>),
    Languages(Subtree<LanguagesHandler>),
    Features(Subtree<FeaturesHandler>),
    Certificates { intermediary: bool, tree: Subtree<CertificatesHandler> },
    Signature(Subtree<SignatureHandler>),
    TypeHeader(Subtree<TypeHeaderHandler>),
    Custom { id: String, canon: Canonicalizer, out: Vec<u8> },
    Container(Subtree<ContainerHandler>),
    EncryptedData(Subtree<EncryptedDataHandler>),
    Fault(Subtree<FaultHandler>),
}

/// Result of one structural pass.
pub(crate) enum Outcome {
    Message { msg: Box<OsciMessage>, placeholders: Vec<Attachment> },
    Encrypted(EncryptedData),
}

pub(crate) struct StructuralParser {
    stack: Vec<Frame>,
    envelope: Option<EnvelopeKind>,
    msg: Option<OsciMessage>,
    transport: Option<EncryptedData>,
    header_seen: bool,
    body_seen: bool,
    envelope_closed: bool,
    seen_headers: HashSet<String>,
    seen_ids: HashSet<String>,
    placeholders: Vec<Attachment>,
    pub(crate) collector: DigestCollector,
}

fn whitespace_only(ev: &XmlEvent, context: &str) -> Result<()> {
    match ev {
        XmlEvent::Text(t) if t.trim().is_empty() => Ok(()),
        XmlEvent::Text(_) => Err(OsciError::malformed(format!("unexpected text in {}", context))),
        XmlEvent::Start(tag) => Err(OsciError::malformed(format!("unexpected {} in {}", tag.qname, context))),
        XmlEvent::End(qname) => Err(OsciError::malformed(format!("unexpected end of {} in {}", qname, context))),
    }
}

/// Last whitespace-separated token of `xsi:schemaLocation`.
fn schema_of(tag: &StartTag) -> Option<&str> {
    tag.attr_ns(ns::XSI, "schemaLocation")
        .and_then(|loc| loc.split_whitespace().last())
}

impl StructuralParser {
    pub(crate) fn new() -> Self {
        Self {
            stack: vec![Frame::Document],
            envelope: None,
            msg: None,
            transport: None,
            header_seen: false,
            body_seen: false,
            envelope_closed: false,
            seen_headers: HashSet::new(),
            seen_ids: HashSet::new(),
            placeholders: Vec::new(),
            collector: DigestCollector::new(),
        }
    }

    pub(crate) fn envelope(&self) -> Option<EnvelopeKind> {
        self.envelope
    }

    /// Kind of the message being built; errors before the envelope opened.
    fn msg_mut(&mut self) -> Result<&mut OsciMessage> {
        self.msg
            .as_mut()
            .ok_or_else(|| OsciError::malformed("message content outside an OSCI envelope"))
    }

    fn kind(&self) -> Option<MessageKind> {
        match self.envelope {
            Some(EnvelopeKind::Message(kind)) => Some(kind),
            _ => None,
        }
    }

    /// Feed one event: digest collection first, then the frame stack.
    pub(crate) fn feed(&mut self, ev: XmlEvent) -> Result<()> {
        self.collector.observe(&ev)?;
        self.event(ev)
    }

    fn event(&mut self, ev: XmlEvent) -> Result<()> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| OsciError::malformed("event after the document ended"))?;
        match frame {
            Frame::Document => {
                self.stack.push(Frame::Document);
                match ev {
                    XmlEvent::Start(tag) if !self.envelope_closed && tag.is(ns::SOAP, "Envelope") => {
                        self.open_envelope(&tag)?;
                        self.stack.push(Frame::Envelope);
                    }
                    other => whitespace_only(&other, "document")?,
                }
            }
            Frame::Envelope => match ev {
                XmlEvent::End(_) => {
                    if !self.body_seen {
                        return Err(OsciError::malformed("envelope has no body"));
                    }
                    self.envelope_closed = true;
                }
                XmlEvent::Start(tag) if tag.is(ns::SOAP, "Header") && !self.header_seen && !self.body_seen => {
                    self.header_seen = true;
                    self.stack.push(Frame::Envelope);
                    self.stack.push(Frame::Header);
                }
                XmlEvent::Start(tag) if tag.is(ns::SOAP, "Body") && !self.body_seen => {
                    self.body_seen = true;
                    self.claim_id(&tag)?;
                    self.stack.push(Frame::Envelope);
                    self.stack.push(Frame::Body);
                }
                other => {
                    self.stack.push(Frame::Envelope);
                    whitespace_only(&other, "envelope")?;
                }
            },
            Frame::Header => match ev {
                XmlEvent::End(_) => {}
                XmlEvent::Start(tag) => {
                    self.stack.push(Frame::Header);
                    let child = self.open_header(&tag)?;
                    self.stack.push(child);
                }
                other => {
                    self.stack.push(Frame::Header);
                    whitespace_only(&other, "header")?;
                }
            },
            Frame::Body => match ev {
                XmlEvent::End(_) => {}
                XmlEvent::Start(tag) => {
                    self.stack.push(Frame::Body);
                    let child = self.open_body_child(&tag)?;
                    self.stack.push(child);
                }
                other => {
                    self.stack.push(Frame::Body);
                    whitespace_only(&other, "body")?;
                }
            },
            Frame::ContentPackage => match ev {
                XmlEvent::End(_) => {}
                XmlEvent::Start(tag) if tag.is(ns::XENC, "EncryptedData") => {
                    self.stack.push(Frame::ContentPackage);
                    self.stack
                        .push(Frame::EncryptedData(Subtree::new(&tag, EncryptedDataHandler::default())?));
                }
                XmlEvent::Start(tag) if tag.is(ns::OSCI, "ContentContainer") => {
                    self.stack.push(Frame::ContentPackage);
                    self.stack.push(Frame::Container(Subtree::new(&tag, ContainerHandler::default())?));
                }
                other => {
                    self.stack.push(Frame::ContentPackage);
                    whitespace_only(&other, "content package")?;
                }
            },
            Frame::Custom { id, mut canon, mut out } => {
                canon.event(&ev, &mut out);
                if canon.depth() == 0 {
                    let xml = String::from_utf8(out).map_err(|e| OsciError::malformed(e.to_string()))?;
                    trace!(%id, "custom header parsed");
                    self.msg_mut()?.custom_headers.push(CustomHeader::from_canonical(id, xml));
                } else {
                    self.stack.push(Frame::Custom { id, canon, out });
                }
            }
            sub => self.feed_subtree(sub, &ev)?,
        }
        Ok(())
    }

    fn feed_subtree(&mut self, frame: Frame, ev: &XmlEvent) -> Result<()> {
        macro_rules! step {
            ($tree:ident, $rebuild:expr, $close:expr) => {{
                let mut $tree = $tree;
                if $tree.event(ev)? {
                    $close
                } else {
                    self.stack.push($rebuild);
                }
            }};
        }
        match frame {
            Frame::ControlBlock(tree) => step!(tree, Frame::ControlBlock(tree), {
                self.msg_mut()?.control_block = tree.into_inner().cb;
            }),
            Frame::Languages(tree) => step!(tree, Frame::Languages(tree), {
                self.msg_mut()?.desired_languages = Some(tree.into_inner().languages);
            }),
            Frame::Features(tree) => step!(tree, Frame::Features(tree), {
                self.msg_mut()?.features = Some(tree.into_inner().features);
            }),
            Frame::Certificates { intermediary, tree } => step!(tree, Frame::Certificates { intermediary, tree }, {
                let roles = roles_from_entries(tree.into_inner().entries);
                self.place_roles(intermediary, roles)?;
            }),
            Frame::Signature(tree) => step!(tree, Frame::Signature(tree), {
                let block = tree.into_inner().finish()?;
                self.collector.set_reference_algorithms(reference_algorithms(&block))?;
                debug!(references = block.signed_info.references.len(), header = %block.header, "signature header parsed");
                self.msg_mut()?.signature = Some(block);
            }),
            Frame::TypeHeader(tree) => step!(tree, Frame::TypeHeader(tree), {
                self.msg_mut()?.type_header = tree.into_inner().header;
            }),
            Frame::Container(tree) => step!(tree, Frame::Container(tree), {
                let container = tree.into_inner().finish()?;
                for r in container.attachment_refs() {
                    self.declare(r, false);
                }
                self.msg_mut()?.contents.push(container);
            }),
            Frame::EncryptedData(tree) => step!(tree, Frame::EncryptedData(tree), {
                let enc = tree.into_inner().finish()?;
                if self.envelope == Some(EnvelopeKind::Encrypted) {
                    self.transport = Some(enc);
                } else {
                    if let CipherPayload::Reference(r) = &enc.payload {
                        self.declare(r, true);
                    }
                    for r in &enc.attachment_refs {
                        self.declare(r, true);
                    }
                    self.msg_mut()?.encrypted.push(enc);
                }
            }),
            Frame::Fault(tree) => step!(tree, Frame::Fault(tree), {
                self.msg_mut()?.fault = Some(tree.into_inner().finish());
            }),
            Frame::Document
            | Frame::Envelope
            | Frame::Header
            | Frame::Body
            | Frame::ContentPackage
            | Frame::Custom { .. } => {
                return Err(OsciError::malformed("structural frame routed as sub-parser"));
            }
        }
        Ok(())
    }

    fn open_envelope(&mut self, tag: &StartTag) -> Result<()> {
        let envelope = match schema_of(tag) {
            None => EnvelopeKind::Message(MessageKind::Fault),
            Some(SCHEMA_ENCRYPTED) => EnvelopeKind::Encrypted,
            Some(schema) => match MessageKind::from_schema(schema) {
                Some(kind) => EnvelopeKind::Message(kind),
                None => {
                    return Err(OsciError::parse(
                        FaultCode::UnknownMessageType,
                        format!("unknown schema identifier {}", schema),
                    ))
                }
            },
        };
        debug!(?envelope, "envelope recognized");
        if let EnvelopeKind::Message(kind) = envelope {
            self.collector.set_signature_header(kind.signature_header().0);
            self.msg = Some(OsciMessage::new(kind));
        }
        self.envelope = Some(envelope);
        Ok(())
    }

    /// Reserve the element's Id; duplicates anywhere in header or body fail.
    fn claim_id(&mut self, tag: &StartTag) -> Result<String> {
        let id = tag
            .attr("Id")
            .ok_or_else(|| OsciError::parse(FaultCode::MissingId, format!("{} has no Id", tag.qname)))?;
        if !self.seen_ids.insert(id.to_string()) {
            return Err(OsciError::parse(FaultCode::DuplicateId, format!("Id {} used twice", id)));
        }
        Ok(id.to_string())
    }

    fn known_header(&self, kind: MessageKind, tag: &StartTag) -> bool {
        if tag.ns_uri.as_deref() != Some(ns::OSCI) {
            return false;
        }
        let local = tag.local.as_str();
        if local == "ControlBlock" {
            return true;
        }
        if kind.is_fault() {
            return false;
        }
        if local == "DesiredLanguages" {
            return kind.is_request();
        }
        SHARED_HEADERS.contains(&local)
            || local == kind.signature_header().0
            || kind.type_header() == Some(local)
    }

    /// OSCI header names that exist but do not belong to this kind.
    fn foreign_osci_header(tag: &StartTag) -> bool {
        tag.ns_uri.as_deref() == Some(ns::OSCI)
            && (SHARED_HEADERS.contains(&tag.local.as_str())
                || tag.local == "ClientSignature"
                || tag.local == "SupplierSignature"
                || MessageKind::from_type_header(&tag.local).is_some())
    }

    fn open_header(&mut self, tag: &StartTag) -> Result<Frame> {
        let kind = self
            .kind()
            .ok_or_else(|| OsciError::malformed("the encryption envelope carries no headers"))?;

        if !self.known_header(kind, tag) {
            if Self::foreign_osci_header(tag) {
                return Err(OsciError::malformed(format!("{} not allowed in {}", tag.qname, kind)));
            }
            let id = self.claim_id(tag)?;
            let mut canon = Canonicalizer::new();
            let mut out = Vec::new();
            canon.start(tag, &mut out);
            return Ok(Frame::Custom { id, canon, out });
        }

        if !self.seen_headers.insert(tag.qname.clone()) {
            return Err(OsciError::parse(FaultCode::DuplicateHeader, format!("{} occurs twice", tag.qname)));
        }
        self.claim_id(tag)?;
        trace!(header = %tag.local, "header");

        let frame = match tag.local.as_str() {
            "ControlBlock" => Frame::ControlBlock(Subtree::new(tag, ControlBlockHandler::default())?),
            "DesiredLanguages" => Frame::Languages(Subtree::new(tag, LanguagesHandler::default())?),
            "FeatureDescription" => Frame::Features(Subtree::new(tag, FeaturesHandler::default())?),
            "IntermediaryCertificates" => Frame::Certificates {
                intermediary: true,
                tree: Subtree::new(tag, CertificatesHandler::default())?,
            },
            "NonIntermediaryCertificates" => Frame::Certificates {
                intermediary: false,
                tree: Subtree::new(tag, CertificatesHandler::default())?,
            },
            local if local == kind.signature_header().0 => {
                Frame::Signature(Subtree::new(tag, SignatureHandler::default())?)
            }
            _ => Frame::TypeHeader(Subtree::new(tag, TypeHeaderHandler::default())?),
        };
        Ok(frame)
    }

    fn open_body_child(&mut self, tag: &StartTag) -> Result<Frame> {
        match self.envelope {
            Some(EnvelopeKind::Encrypted) if tag.is(ns::XENC, "EncryptedData") && self.transport.is_none() => {
                Ok(Frame::EncryptedData(Subtree::new(tag, EncryptedDataHandler::default())?))
            }
            Some(EnvelopeKind::Message(kind)) if kind.is_fault() && tag.is(ns::SOAP, "Fault") => {
                Ok(Frame::Fault(Subtree::new(tag, FaultHandler::default())?))
            }
            Some(EnvelopeKind::Message(kind)) if kind.carries_content() && tag.is(ns::OSCI, "ContentPackage") => {
                Ok(Frame::ContentPackage)
            }
            _ => Err(OsciError::malformed(format!("unexpected {} in body", tag.qname))),
        }
    }

    fn place_roles(&mut self, intermediary: bool, roles: Vec<Role>) -> Result<()> {
        let msg = self.msg_mut()?;
        for role in roles {
            if intermediary != (role.kind == RoleKind::Intermediary) {
                return Err(OsciError::malformed(format!("{} certificate in the wrong certificate header", role.kind)));
            }
            match role.kind {
                RoleKind::Originator => msg.originator = Some(role),
                RoleKind::Addressee => msg.addressee = Some(role),
                RoleKind::Intermediary => msg.intermediary = Some(role),
                RoleKind::Author => msg.authors.push(role),
                RoleKind::Reader => msg.readers.push(role),
            }
        }
        Ok(())
    }

    fn declare(&mut self, ref_id: &str, encrypted: bool) {
        if !self.placeholders.iter().any(|a| a.ref_id() == ref_id) {
            trace!(attachment = ref_id, encrypted, "attachment declared");
            self.placeholders.push(Attachment::declared(ref_id, encrypted));
        }
    }

    /// Structural result once the document ended.
    pub(crate) fn finish(self) -> Result<(Outcome, DigestCollector)> {
        if !self.envelope_closed {
            return Err(OsciError::malformed("document ended before the envelope closed"));
        }
        let outcome = match (self.envelope, self.msg, self.transport) {
            (Some(EnvelopeKind::Encrypted), _, Some(enc)) => Outcome::Encrypted(enc),
            (Some(EnvelopeKind::Encrypted), _, None) => {
                return Err(OsciError::malformed("encryption envelope carries no EncryptedData"))
            }
            (Some(EnvelopeKind::Message(_)), Some(msg), _) => {
                if msg.kind.is_fault() && msg.fault.is_none() {
                    return Err(OsciError::malformed("fault message without soap:Fault"));
                }
                Outcome::Message { msg: Box::new(msg), placeholders: self.placeholders }
            }
            _ => return Err(OsciError::malformed("no envelope found")),
        };
        Ok((outcome, self.collector))
    }
}
