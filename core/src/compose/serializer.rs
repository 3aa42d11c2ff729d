//! MIME serialization of composed messages.
//!
//! One `text/xml` part holding the SOAP envelope, then one part per
//! attachment in declaration order, streamed from its source.

use std::io::Write;
use std::time::Instant;

use tracing::{debug, trace};

use crate::compose::composer::compose;
use crate::config::OsciConfig;
use crate::constants::{ns, XML_PART_CID};
use crate::envelope::encrypt_message;
use crate::message::{MessageState, OsciMessage, PartSlot};
use crate::mime::{MultipartWriter, PartHeaders, TransferEncoding};
use crate::roles::{Certificate, Signer};
use crate::signature::sign;
use crate::telemetry::Stage;
use crate::types::{OsciError, Result};

pub const XML_CONTENT_TYPE: &str = "text/xml; charset=UTF-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Render the SOAP envelope around already rendered header and body parts.
pub(crate) fn envelope_xml<'a>(schema: Option<&str>, headers: impl IntoIterator<Item = &'a str>, body: &str) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    out.push_str("<soap:Envelope");
    for (prefix, uri) in ns::ENVELOPE_BINDINGS {
        out.push_str(" xmlns:");
        out.push_str(prefix);
        out.push_str("=\"");
        out.push_str(uri);
        out.push('"');
    }
    if let Some(schema) = schema {
        out.push_str(" xsi:schemaLocation=\"");
        out.push_str(ns::OSCI);
        out.push(' ');
        out.push_str(schema);
        out.push('"');
    }
    out.push_str("><soap:Header>");
    for h in headers {
        out.push_str(h);
    }
    out.push_str("</soap:Header>");
    out.push_str(body);
    out.push_str("</soap:Envelope>");
    out
}

/// Write a composed (or signed) message to `out`.
pub fn serialize<W: Write>(msg: &mut OsciMessage, out: W, cfg: &OsciConfig) -> Result<W> {
    if !matches!(msg.state, MessageState::Composed | MessageState::Signed) {
        return Err(OsciError::precondition(format!("serialize requires a composed message, found {:?}", msg.state)));
    }
    let started = Instant::now();
    let kind = msg.kind;

    let xml = {
        let parts = msg
            .parts
            .as_ref()
            .ok_or_else(|| OsciError::precondition("composed message has no parts"))?;
        let ordered = parts.ordered(kind.part_order());
        let (body, headers): (Vec<_>, Vec<_>) = ordered.into_iter().partition(|p| p.slot == PartSlot::Body);
        let body = body
            .first()
            .map(|p| p.xml.as_str())
            .ok_or_else(|| OsciError::precondition("composed message has no body"))?;
        envelope_xml(kind.schema(), headers.iter().map(|p| p.xml.as_str()), body)
    };

    let mut writer = MultipartWriter::new(out);
    writer.write_message_headers()?;
    {
        let headers = PartHeaders::new(XML_CONTENT_TYPE, XML_PART_CID, TransferEncoding::Binary);
        let mut part = writer.start_part(&headers)?;
        part.write_all(xml.as_bytes())?;
        part.finish()?;
    }
    msg.counters.add_xml(xml.len());

    let encoding = if cfg.base64_attachments { TransferEncoding::Base64 } else { TransferEncoding::Binary };
    for att in msg.attachments.iter_mut() {
        let content_type = if att.content_type().is_empty() { OCTET_STREAM } else { att.content_type() };
        let headers = PartHeaders::new(content_type, att.ref_id(), encoding);
        let mut part = writer.start_part(&headers)?;
        att.write_wire(&mut part)?;
        let written = part.finish()?;
        trace!(attachment = att.ref_id(), bytes = written, "attachment written");
        msg.counters.add_attachment(written);
    }

    let out = writer.finish()?;
    msg.timer.add_stage_time(Stage::Serialize, started.elapsed());
    msg.take_snapshot();
    debug!(kind = %kind, attachments = msg.attachments.len(), xml_bytes = xml.len(), "message serialized");
    Ok(out)
}

/// Serialize into memory.
pub fn to_bytes(msg: &mut OsciMessage, cfg: &OsciConfig) -> Result<Vec<u8>> {
    serialize(msg, Vec::new(), cfg)
}

/// Compose, optionally sign, and optionally wrap in the transport envelope
/// for `recipient`, writing the result to `out`. Signing and encryption
/// follow `cfg`.
pub fn write_message<W: Write>(
    msg: &mut OsciMessage,
    signer: Option<&dyn Signer>,
    recipient: Option<&Certificate>,
    out: W,
    cfg: &OsciConfig,
) -> Result<W> {
    cfg.validate()?;
    compose(msg)?;
    if cfg.sign && !msg.kind.is_fault() {
        let signer = signer.ok_or_else(|| OsciError::precondition("signing enabled but no signer given"))?;
        sign(msg, signer, cfg)?;
    }
    if cfg.encrypt {
        let recipient = recipient.ok_or_else(|| OsciError::precondition("encryption enabled but no recipient given"))?;
        return encrypt_message(msg, recipient, out, cfg);
    }
    serialize(msg, out, cfg)
}
