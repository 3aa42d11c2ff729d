//! Shared header models and their rendering.

use chrono::{DateTime, Utc};

use crate::constants::{ns, part_ids};
use crate::fault::{FaultCode, TextResources};
use crate::message::process_card::{format_timestamp, ProcessCardBundle};
use crate::roles::{Certificate, RoleKind};
use crate::types::{OsciError, Result};
use crate::xml::{canonicalize_fragment, XmlElement};

/// Challenge/response and conversation bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlBlock {
    pub conversation_id: Option<String>,
    pub sequence_number: Option<u32>,
    pub response: Option<String>,
    pub challenge: Option<String>,
}

impl ControlBlock {
    pub fn is_empty(&self) -> bool {
        self.conversation_id.is_none()
            && self.sequence_number.is_none()
            && self.response.is_none()
            && self.challenge.is_none()
    }

    pub fn to_xml(&self) -> XmlElement {
        XmlElement::osci("ControlBlock")
            .attr("Id", part_ids::CONTROL_BLOCK)
            .attr_opt("ConversationId", self.conversation_id.clone())
            .attr_opt("SequenceNumber", self.sequence_number.map(|n| n.to_string()))
            .child_opt(self.response.as_ref().map(|r| XmlElement::osci("Response").text(r.clone())))
            .child_opt(self.challenge.as_ref().map(|c| XmlElement::osci("Challenge").text(c.clone())))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredLanguages {
    pub languages: Vec<String>,
}

impl DesiredLanguages {
    pub fn to_xml(&self) -> XmlElement {
        XmlElement::osci("DesiredLanguages")
            .attr("Id", part_ids::DESIRED_LANGUAGES)
            .attr("LanguagesList", self.languages.join(" "))
    }

    pub fn parse_list(raw: &str) -> Self {
        Self { languages: raw.split_whitespace().map(str::to_string).collect() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub key: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureDescription {
    pub features: Vec<Feature>,
}

impl FeatureDescription {
    pub fn to_xml(&self) -> XmlElement {
        let supported = XmlElement::osci("SupportedFeatures").children(
            self.features
                .iter()
                .map(|f| XmlElement::osci("Feature").attr("Key", f.key.clone()).attr("Version", f.version.clone())),
        );
        XmlElement::osci("FeatureDescription")
            .attr("Id", part_ids::FEATURE_DESCRIPTION)
            .child(supported)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateUsage {
    Cipher,
    Signature,
}

impl CertificateUsage {
    pub fn element(&self) -> &'static str {
        match self {
            CertificateUsage::Cipher => "CipherCertificate",
            CertificateUsage::Signature => "SignatureCertificate",
        }
    }

    pub fn from_element(local: &str) -> Option<Self> {
        match local {
            "CipherCertificate" => Some(CertificateUsage::Cipher),
            "SignatureCertificate" => Some(CertificateUsage::Signature),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateEntry {
    pub role: RoleKind,
    pub usage: CertificateUsage,
    pub certificate: Certificate,
}

/// `ds:X509Data` wrapper carrying one certificate.
pub fn x509_data(cert: &Certificate) -> Result<XmlElement> {
    Ok(XmlElement::ds("X509Data").child(XmlElement::ds("X509Certificate").text(cert.to_base64()?)))
}

/// Render a certificate header (`IntermediaryCertificates` or
/// `NonIntermediaryCertificates`).
pub fn certificates_xml(local: &str, id: &str, entries: &[CertificateEntry]) -> Result<XmlElement> {
    let mut el = XmlElement::osci(local).attr("Id", id);
    for entry in entries {
        el.push(
            XmlElement::osci(entry.usage.element())
                .attr("Role", entry.role.as_str())
                .child(x509_data(&entry.certificate)?),
        );
    }
    Ok(el)
}

/// Extension header kept in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomHeader {
    pub id: String,
    /// Canonical markup of the whole header element.
    pub xml: String,
}

impl CustomHeader {
    /// Validate and canonicalize `markup`. Prefixes bound on the envelope
    /// may be used without redeclaring them.
    pub fn new(markup: &str) -> Result<Self> {
        let canonical = canonicalize_fragment(markup, ns::ENVELOPE_BINDINGS)?;
        let xml = String::from_utf8(canonical).map_err(|e| OsciError::malformed(e.to_string()))?;
        let id = extract_root_id(&xml)?;
        Ok(Self { id, xml })
    }

    pub(crate) fn from_canonical(id: String, xml: String) -> Self {
        Self { id, xml }
    }
}

fn extract_root_id(xml: &str) -> Result<String> {
    use crate::xml::{NsScope, XmlEvent, XmlEventSource};

    let mut source = XmlEventSource::with_scope(xml.as_bytes(), NsScope::with_bindings(ns::ENVELOPE_BINDINGS));
    match source.next_event()? {
        Some(XmlEvent::Start(tag)) => tag
            .attr("Id")
            .map(str::to_string)
            .ok_or_else(|| OsciError::precondition(format!("custom header {} has no Id", tag.qname))),
        _ => Err(OsciError::precondition("custom header is not an element")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Any matching delivery.
    All,
    /// Only deliveries not fetched before.
    Unfetched,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::All => "all",
            SelectionMode::Unfetched => "unfetched",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "all" => Some(SelectionMode::All),
            "unfetched" => Some(SelectionMode::Unfetched),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionRule {
    MessageIds(Vec<String>),
    ReceivedAfter(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub rule: SelectionRule,
    pub mode: SelectionMode,
    pub quantity: Option<u32>,
}

impl Selection {
    pub fn to_xml(&self) -> XmlElement {
        let el = XmlElement::osci("SelectionRule")
            .attr("SelectionMode", self.mode.as_str())
            .attr_opt("Quantity", self.quantity.map(|q| q.to_string()));
        match &self.rule {
            SelectionRule::MessageIds(ids) => {
                el.children(ids.iter().map(|id| XmlElement::osci("MessageId").text(id.clone())))
            }
            SelectionRule::ReceivedAfter(ts) => {
                el.child(XmlElement::osci("ReceptionOfDelivery").text(format_timestamp(ts)))
            }
        }
    }
}

/// Feedback entry of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub language: String,
    pub code: String,
    pub text: String,
}

impl Feedback {
    pub fn from_code(code: FaultCode, language: &str, resources: &dyn TextResources) -> Self {
        let code = code.as_str();
        Self { language: language.to_string(), text: resources.describe(&code), code }
    }

    /// Text for the code from `resources`, falling back to the wire text.
    pub fn describe(&self, resources: &dyn TextResources) -> String {
        resources.lookup(&self.code).map(str::to_string).unwrap_or_else(|| self.text.clone())
    }

    pub fn to_xml(&self) -> XmlElement {
        XmlElement::osci("Entry")
            .attr("xml:lang", self.language.clone())
            .child(XmlElement::osci("Code").text(self.code.clone()))
            .child(XmlElement::osci("Text").text(self.text.clone()))
    }
}

/// Kind-specific header payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeHeader {
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub recipient: Option<String>,
    pub selection: Option<Selection>,
    pub feedback: Vec<Feedback>,
    pub process_cards: Vec<ProcessCardBundle>,
}

impl TypeHeader {
    pub fn to_xml(&self, local: &str, id: &str) -> XmlElement {
        let feedback = if self.feedback.is_empty() {
            None
        } else {
            Some(XmlElement::osci("Feedback").children(self.feedback.iter().map(Feedback::to_xml)))
        };
        XmlElement::osci(local)
            .attr("Id", id)
            .child_opt(self.message_id.as_ref().map(|m| XmlElement::osci("MessageId").text(m.clone())))
            .child_opt(self.subject.as_ref().map(|s| XmlElement::osci("Subject").text(s.clone())))
            .child_opt(self.recipient.as_ref().map(|r| XmlElement::osci("Recipient").text(r.clone())))
            .child_opt(self.selection.as_ref().map(Selection::to_xml))
            .child_opt(feedback)
            .children(self.process_cards.iter().map(ProcessCardBundle::to_xml))
    }
}
