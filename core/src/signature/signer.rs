//! Enveloped signature creation.

use std::time::Instant;

use tracing::debug;

use crate::compose::compose;
use crate::config::OsciConfig;
use crate::constants::ns;
use crate::crypto::{digest, DigestBuilder};
use crate::message::{MessageState, OsciMessage, Part, PartSlot, CID_PREFIX};
use crate::roles::{Role, RoleKind, Signer};
use crate::signature::signed_info::{Reference, SignatureBlock, SignedInfo};
use crate::telemetry::Stage;
use crate::types::{OsciError, Result};
use crate::xml::canonicalize_fragment;

/// Position whose signature certificate travels with a message of this
/// direction.
fn signer_position(msg: &OsciMessage) -> RoleKind {
    if msg.kind.is_request() {
        RoleKind::Originator
    } else {
        RoleKind::Intermediary
    }
}

/// Put the signer's certificate into its role, re-composing if that changed
/// the certificate headers.
fn place_certificate(msg: &mut OsciMessage, signer: &dyn Signer) -> Result<()> {
    let cert = signer.signing_certificate();
    let position = signer_position(msg);
    let current = match position {
        RoleKind::Originator => msg.originator.as_ref(),
        _ => msg.intermediary.as_ref(),
    };
    if current.and_then(|r| r.signature_certificate.as_ref()) == Some(cert) {
        return Ok(());
    }
    let role = current
        .cloned()
        .unwrap_or_else(|| Role::new(position))
        .with_signature_certificate(cert.clone());
    msg.set_role(role);
    compose(msg)
}

/// Sign a composed message. References every signable part in kind order,
/// then every attachment by the bytes it travels as.
pub fn sign(msg: &mut OsciMessage, signer: &dyn Signer, cfg: &OsciConfig) -> Result<()> {
    if msg.state != MessageState::Composed {
        return Err(OsciError::precondition(format!("sign requires a composed message, found {:?}", msg.state)));
    }
    if msg.kind.is_fault() {
        return Err(OsciError::precondition("fault messages are not signed"));
    }
    if !signer.signing_certificate().key_usage().permits_signing() {
        return Err(OsciError::precondition("signer certificate does not permit signing"));
    }
    for att in &msg.attachments {
        att.require_rereadable()?;
    }

    let started = Instant::now();
    place_certificate(msg, signer)?;

    let mut references = Vec::new();
    {
        let parts = msg
            .parts
            .as_ref()
            .ok_or_else(|| OsciError::precondition("composed message has no parts"))?;
        for part in parts.signable(msg.kind.part_order()) {
            let canonical = canonicalize_fragment(&part.xml, ns::ENVELOPE_BINDINGS)?;
            references.push(Reference {
                uri: format!("#{}", part.id),
                digest_alg: cfg.digest,
                digest: digest(cfg.digest, &canonical),
            });
        }
    }
    for att in msg.attachments.iter_mut() {
        let mut hasher = DigestBuilder::new(cfg.digest);
        att.write_wire(&mut hasher)?;
        references.push(Reference {
            uri: format!("{}{}", CID_PREFIX, att.ref_id()),
            digest_alg: cfg.digest,
            digest: hasher.finalize(),
        });
    }
    for _ in &references {
        msg.counters.add_digest();
    }

    let signed_info = SignedInfo::new(signer.signature_algorithm(), references);
    let signature_value = signer.sign(&signed_info.canonical_bytes()?)?;

    let (header, id) = msg.kind.signature_header();
    let block = SignatureBlock {
        header: header.to_string(),
        id: id.to_string(),
        signed_info,
        signature_value,
        certificate: signer.signing_certificate().clone(),
    };
    let xml = block.to_xml()?.render();
    if let Some(parts) = msg.parts.as_mut() {
        parts.set(Part::new(PartSlot::Signature, id, xml));
    }

    debug!(
        kind = %msg.kind,
        references = block.signed_info.references.len(),
        signer = block.certificate.subject(),
        "message signed"
    );
    msg.signature = Some(block);
    msg.state = MessageState::Signed;
    msg.timer.add_stage_time(Stage::Sign, started.elapsed());
    Ok(())
}
