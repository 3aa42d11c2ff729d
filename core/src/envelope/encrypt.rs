//! Transport encryption of a whole serialized message.
//!
//! The outer message has two parts: an envelope whose body holds one
//! `xenc:EncryptedData` with the wrapped content key and a
//! `CipherReference` to `cid:osci_enc`, and the `osci_enc` part carrying the
//! inner message run through the streaming cipher. The inner message is
//! serialized straight into the cipher; it is never buffered whole.

use std::io::Write;
use std::time::Instant;

use tracing::debug;

use crate::compose::serializer::{envelope_xml, serialize, OCTET_STREAM, XML_CONTENT_TYPE};
use crate::config::OsciConfig;
use crate::constants::{part_ids, ENCRYPTED_PART_CID, SCHEMA_ENCRYPTED, XML_PART_CID};
use crate::crypto::{generate_content_key, random_iv};
use crate::envelope::stream::EncryptingWriter;
use crate::message::encrypted::wrap_for;
use crate::message::{CipherPayload, EncryptedData, MessageState, OsciMessage};
use crate::mime::{MultipartWriter, PartHeaders, TransferEncoding};
use crate::roles::Certificate;
use crate::telemetry::Stage;
use crate::types::{OsciError, Result};
use crate::xml::XmlElement;

/// Metadata part of the transport envelope.
fn outer_xml(enc: &EncryptedData) -> Result<String> {
    let body = XmlElement::soap("Body").attr("Id", part_ids::BODY).child(enc.to_xml()?).render();
    Ok(envelope_xml(Some(SCHEMA_ENCRYPTED), std::iter::empty(), &body))
}

/// Serialize `msg` encrypted for `recipient` into `out`.
pub fn encrypt_message<W: Write>(msg: &mut OsciMessage, recipient: &Certificate, out: W, cfg: &OsciConfig) -> Result<W> {
    if !matches!(msg.state, MessageState::Composed | MessageState::Signed) {
        return Err(OsciError::precondition(format!("encrypt requires a composed message, found {:?}", msg.state)));
    }
    let started = Instant::now();
    let serialize_before = msg.timer.stage_times.get(Stage::Serialize);

    let cek = generate_content_key(cfg.cipher);
    let enc = EncryptedData {
        id: None,
        cipher: cfg.cipher,
        iv_length: cfg.iv_length,
        keys: wrap_for(&cek, &[recipient])?,
        payload: CipherPayload::Reference(ENCRYPTED_PART_CID.to_string()),
        attachment_refs: Vec::new(),
    };
    let xml = outer_xml(&enc)?;

    let mut writer = MultipartWriter::new(out);
    writer.write_message_headers()?;
    {
        let headers = PartHeaders::new(XML_CONTENT_TYPE, XML_PART_CID, TransferEncoding::Binary);
        let mut part = writer.start_part(&headers)?;
        part.write_all(xml.as_bytes())?;
        part.finish()?;
    }

    let encoding = if cfg.base64_attachments { TransferEncoding::Base64 } else { TransferEncoding::Binary };
    let counters = {
        let headers = PartHeaders::new(OCTET_STREAM, ENCRYPTED_PART_CID, encoding);
        let mut part = writer.start_part(&headers)?;
        let cipher = EncryptingWriter::new(&mut part, cfg.cipher, &cek, random_iv(cfg.iv_length)?, cfg.chunk_size)?;
        let cipher = serialize(msg, cipher, cfg)?;
        let (_, counters) = cipher.finish()?;
        part.finish()?;
        counters
    };
    let out = writer.finish()?;

    msg.counters.add_xml(xml.len());
    msg.counters += counters;
    let serialize_time = msg.timer.stage_times.get(Stage::Serialize).saturating_sub(serialize_before);
    msg.timer.add_stage_time(Stage::Encrypt, started.elapsed().saturating_sub(serialize_time));
    msg.take_snapshot();
    debug!(
        kind = %msg.kind,
        recipient = recipient.subject(),
        cipher = cfg.cipher.uri(),
        "message transport-encrypted"
    );
    Ok(out)
}

/// Encrypt into memory.
pub fn encrypt_to_bytes(msg: &mut OsciMessage, recipient: &Certificate, cfg: &OsciConfig) -> Result<Vec<u8>> {
    encrypt_message(msg, recipient, Vec::new(), cfg)
}
