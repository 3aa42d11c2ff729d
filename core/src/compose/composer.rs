//! Projection of a message into its ordered part set.
//!
//! Shared parts (control block, languages, features, certificates, custom
//! headers) come from one routine; the type header and body depend on the
//! kind. Composing a message that is already composed or signed is a no-op.

use std::collections::HashSet;
use std::time::Instant;

use tracing::debug;

use crate::constants::part_ids;
use crate::message::{
    certificates_xml, CertificateEntry, CertificateUsage, MessageKind, MessageState, OsciMessage, Part, PartSet,
    PartSlot,
};
use crate::roles::Role;
use crate::telemetry::Stage;
use crate::types::{OsciError, Result};
use crate::xml::XmlElement;

fn check_preconditions(msg: &OsciMessage) -> Result<()> {
    let kind = msg.kind;
    if kind.is_fault() {
        if msg.fault.is_none() {
            return Err(OsciError::precondition("fault message without fault payload"));
        }
        return Ok(());
    }
    let cb = &msg.control_block;
    if kind.requires_conversation_id() && cb.conversation_id.is_none() {
        return Err(OsciError::precondition(format!("{} requires a conversation id", kind)));
    }
    if cb.challenge.is_none() {
        return Err(OsciError::precondition(format!("{} requires a challenge", kind)));
    }
    if !kind.is_request() && cb.response.is_none() {
        return Err(OsciError::precondition(format!("{} must echo the request challenge", kind)));
    }

    check_unique_ids(msg)?;

    let mut declared: HashSet<&str> = HashSet::new();
    for attachment in &msg.attachments {
        let ref_id = attachment.ref_id();
        if ref_id.is_empty() || ref_id.chars().any(|c| c.is_control() || c == '<' || c == '>') {
            return Err(OsciError::precondition(format!("attachment ref id {:?} cannot be a Content-ID", ref_id)));
        }
        if attachment.content_type().chars().any(char::is_control) {
            return Err(OsciError::precondition(format!("content type of {} spans lines", ref_id)));
        }
        if !declared.insert(ref_id) {
            return Err(OsciError::precondition(format!("attachment {} added twice", ref_id)));
        }
    }
    let mut referenced: HashSet<&str> = HashSet::new();
    for container in &msg.contents {
        referenced.extend(container.attachment_refs());
    }
    for enc in &msg.encrypted {
        referenced.extend(enc.attachment_refs.iter().map(String::as_str));
    }
    if let Some(missing) = referenced.iter().find(|r| !declared.contains(*r)) {
        return Err(OsciError::precondition(format!("content references missing attachment {}", missing)));
    }
    if let Some(orphan) = declared.iter().find(|d| !referenced.contains(*d)) {
        return Err(OsciError::precondition(format!("attachment {} is not referenced by any content", orphan)));
    }
    Ok(())
}

/// Header and body Ids share one namespace on the wire.
fn check_unique_ids(msg: &OsciMessage) -> Result<()> {
    let kind = msg.kind;
    let mut ids: HashSet<String> = [
        part_ids::CONTROL_BLOCK,
        part_ids::DESIRED_LANGUAGES,
        part_ids::FEATURE_DESCRIPTION,
        part_ids::INTERMEDIARY_CERTIFICATES,
        part_ids::NON_INTERMEDIARY_CERTIFICATES,
        part_ids::BODY,
        kind.signature_header().1,
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    ids.extend(kind.type_header_id());
    for header in &msg.custom_headers {
        if !ids.insert(header.id.clone()) {
            return Err(OsciError::precondition(format!("custom header Id {} is already in use", header.id)));
        }
    }
    Ok(())
}

fn role_entries(role: &Role, out: &mut Vec<CertificateEntry>) {
    if let Some(cert) = &role.cipher_certificate {
        out.push(CertificateEntry { role: role.kind, usage: CertificateUsage::Cipher, certificate: cert.clone() });
    }
    if let Some(cert) = &role.signature_certificate {
        out.push(CertificateEntry { role: role.kind, usage: CertificateUsage::Signature, certificate: cert.clone() });
    }
}

fn body_xml(msg: &OsciMessage) -> Result<XmlElement> {
    let mut body = XmlElement::soap("Body").attr("Id", part_ids::BODY);
    if let Some(fault) = &msg.fault {
        body.push(
            XmlElement::soap("Fault")
                .child(XmlElement::unqualified("faultcode").text(fault.fault_code.clone()))
                .child(XmlElement::unqualified("faultstring").text(fault.message.clone()))
                .child(XmlElement::unqualified("detail").child(XmlElement::osci("Code").text(fault.code.clone()))),
        );
        return Ok(body);
    }
    if msg.kind.carries_content() && !(msg.contents.is_empty() && msg.encrypted.is_empty()) {
        let mut package = XmlElement::osci("ContentPackage");
        for enc in &msg.encrypted {
            package.push(enc.to_xml()?);
        }
        for container in &msg.contents {
            package.push(container.to_xml());
        }
        body.push(package);
    }
    Ok(body)
}

/// Build the part set for the message's kind.
pub fn compose(msg: &mut OsciMessage) -> Result<()> {
    if matches!(msg.state, MessageState::Composed | MessageState::Signed) && msg.parts.is_some() {
        return Ok(());
    }
    check_preconditions(msg)?;
    let started = Instant::now();
    let kind: MessageKind = msg.kind;
    let mut parts = PartSet::default();

    parts.set(Part::new(PartSlot::ControlBlock, part_ids::CONTROL_BLOCK, msg.control_block.to_xml().render()));

    if !kind.is_fault() {
        if kind.is_request() {
            if let Some(langs) = &msg.desired_languages {
                parts.set(Part::new(PartSlot::DesiredLanguages, part_ids::DESIRED_LANGUAGES, langs.to_xml().render()));
            }
        }
        if let Some(features) = &msg.features {
            parts.set(Part::new(
                PartSlot::FeatureDescription,
                part_ids::FEATURE_DESCRIPTION,
                features.to_xml().render(),
            ));
        }

        let mut intermediary = Vec::new();
        if let Some(role) = &msg.intermediary {
            role_entries(role, &mut intermediary);
        }
        if !intermediary.is_empty() {
            let xml = certificates_xml("IntermediaryCertificates", part_ids::INTERMEDIARY_CERTIFICATES, &intermediary)?;
            parts.set(Part::new(PartSlot::IntermediaryCertificates, part_ids::INTERMEDIARY_CERTIFICATES, xml.render()));
        }

        let mut others = Vec::new();
        for role in msg.originator.iter().chain(msg.addressee.iter()).chain(&msg.authors).chain(&msg.readers) {
            role_entries(role, &mut others);
        }
        if !others.is_empty() {
            let xml =
                certificates_xml("NonIntermediaryCertificates", part_ids::NON_INTERMEDIARY_CERTIFICATES, &others)?;
            parts.set(Part::new(
                PartSlot::NonIntermediaryCertificates,
                part_ids::NON_INTERMEDIARY_CERTIFICATES,
                xml.render(),
            ));
        }

        for header in &msg.custom_headers {
            parts.set(Part::new(PartSlot::CustomHeaders, header.id.clone(), header.xml.clone()));
        }

        if let (Some(local), Some(id)) = (kind.type_header(), kind.type_header_id()) {
            parts.set(Part::new(PartSlot::TypeHeader, id.clone(), msg.type_header.to_xml(local, &id).render()));
        }
    }

    parts.set(Part::new(PartSlot::Body, part_ids::BODY, body_xml(msg)?.render()));

    let composed = parts.ordered(kind.part_order()).len();
    for _ in 0..composed {
        msg.counters.add_part();
    }
    debug!(kind = %kind, parts = composed, "message composed");

    msg.parts = Some(parts);
    msg.signature = None;
    msg.state = MessageState::Composed;
    msg.timer.add_stage_time(Stage::Compose, started.elapsed());
    Ok(())
}
