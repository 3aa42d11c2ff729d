//! Inbound path: MIME framing, structural parse with digest collection,
//! attachment binding, transport decryption and signature verification.
//!
//! One blocking pass over the input. An encryption envelope is deciphered
//! as a stream and its plaintext re-enters [`parse_message`] recursively.

mod attachments;
mod collector;
mod content;
mod headers;
mod signature;
mod state;
mod subtree;

pub use content::parse_container_xml;

use std::io::{self, BufReader, Read};
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::OsciConfig;
use crate::envelope::{DecryptContext, DecryptingReader};
use crate::fault::FaultCode;
use crate::message::{CipherPayload, DialogState, EncryptedData, MessageState, OsciMessage};
use crate::mime::MultipartReader;
use crate::signature::verify_signature;
use crate::telemetry::Stage;
use crate::types::{OsciError, Result};
use crate::xml::XmlEventSource;

use attachments::bind_attachments;
use state::{Outcome, StructuralParser};

/// Inbound options, usually derived from [`OsciConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub verify_signatures: bool,
    /// Max bytes kept per attachment; `None` keeps everything.
    pub attachment_retention: Option<usize>,
    /// Reject plaintext responses other than faults; set when the request
    /// being answered went out encrypted.
    pub require_encryption: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { verify_signatures: true, attachment_retention: None, require_encryption: false }
    }
}

impl From<&OsciConfig> for ParseOptions {
    fn from(cfg: &OsciConfig) -> Self {
        Self {
            verify_signatures: cfg.verify_signatures,
            attachment_retention: cfg.attachment_retention,
            require_encryption: false,
        }
    }
}

impl ParseOptions {
    /// Options for the response to the outstanding request of `dialog`.
    pub fn for_response(cfg: &OsciConfig, dialog: &DialogState) -> Self {
        Self { require_encryption: dialog.request_encrypted, ..Self::from(cfg) }
    }
}

/// Counts bytes passing through.
struct Tally<R> {
    inner: R,
    bytes: usize,
}

impl<R: Read> Read for Tally<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes += n;
        Ok(n)
    }
}

/// Parse one message from `input`.
pub fn parse_message<R: Read>(mut input: R, opts: &ParseOptions, ctx: &DecryptContext) -> Result<OsciMessage> {
    parse_dyn(&mut input, opts, ctx, 0)
}

/// Parse from memory.
pub fn from_bytes(raw: &[u8], opts: &ParseOptions, ctx: &DecryptContext) -> Result<OsciMessage> {
    parse_message(raw, opts, ctx)
}

fn parse_dyn(input: &mut dyn Read, opts: &ParseOptions, ctx: &DecryptContext, depth: usize) -> Result<OsciMessage> {
    let started = Instant::now();
    let mut reader = MultipartReader::from_message(input)?;
    let headers = reader
        .next_part()?
        .ok_or_else(|| OsciError::malformed("multipart message has no parts"))?;
    if !headers.content_type.trim_start().to_ascii_lowercase().starts_with("text/xml") {
        return Err(OsciError::malformed(format!("first part is {}, expected text/xml", headers.content_type)));
    }

    let mut parser = StructuralParser::new();
    let xml_bytes = {
        let mut tally = Tally { inner: reader.body(headers.transfer_encoding), bytes: 0 };
        let mut source = XmlEventSource::new(BufReader::new(&mut tally));
        while let Some(ev) = source.next_event()? {
            parser.feed(ev)?;
        }
        drop(source);
        tally.bytes
    };
    let envelope = parser.envelope();
    let (outcome, mut collector) = parser.finish()?;
    debug!(?envelope, depth, xml_bytes, "structure parsed");

    let (mut msg, mut placeholders) = match outcome {
        Outcome::Encrypted(enc) => {
            if depth > 0 {
                return Err(OsciError::malformed("encryption envelope nested inside an encryption envelope"));
            }
            return open_transport(&mut reader, enc, opts, ctx, started);
        }
        Outcome::Message { msg, placeholders } => (*msg, placeholders),
    };
    msg.timer.start_time = started;
    msg.counters.add_xml(xml_bytes);

    if depth == 0 && opts.require_encryption && !msg.kind.is_request() && !msg.kind.is_fault() {
        warn!(kind = %msg.kind, "plaintext message where ciphertext was required");
        return Err(OsciError::confidentiality(
            FaultCode::UnencryptedResponse,
            format!("{} arrived without transport encryption", msg.kind),
        ));
    }

    bind_attachments(&mut reader, &mut placeholders, &mut collector, opts.attachment_retention, &mut msg.counters)?;
    msg.attachments = placeholders;
    let (captured, counters) = collector.finish()?;
    msg.counters += counters;
    msg.timer.add_stage_time(Stage::Parse, started.elapsed());

    if opts.verify_signatures {
        if let Some(block) = &msg.signature {
            let t = Instant::now();
            verify_signature(block, &captured)?;
            msg.signature_verified = true;
            msg.timer.add_stage_time(Stage::Verify, t.elapsed());
        }
    }

    msg.captured = Some(captured);
    msg.state = MessageState::Parsed;
    msg.take_snapshot();
    debug!(
        kind = %msg.kind,
        attachments = msg.attachments.len(),
        signed = msg.signature.is_some(),
        verified = msg.signature_verified,
        "message parsed"
    );
    Ok(msg)
}

/// Decipher the ciphertext part of an encryption envelope and parse the
/// inner message from the plaintext stream.
fn open_transport<R: Read>(
    reader: &mut MultipartReader<R>,
    enc: EncryptedData,
    opts: &ParseOptions,
    ctx: &DecryptContext,
    started: Instant,
) -> Result<OsciMessage> {
    let reference = match &enc.payload {
        CipherPayload::Reference(r) => r.clone(),
        CipherPayload::Inline(_) => {
            return Err(OsciError::malformed("encryption envelope must reference its ciphertext part"))
        }
    };
    let cek = ctx.content_key(&enc)?;
    let parse_time = started.elapsed();

    let headers = reader
        .next_part()?
        .ok_or_else(|| OsciError::parse(FaultCode::AttachmentMissing, "ciphertext part missing"))?;
    if headers.content_id.as_deref() != Some(reference.as_str()) {
        return Err(OsciError::parse(
            FaultCode::AttachmentUnmatched,
            format!("expected ciphertext part {}, found {:?}", reference, headers.content_id),
        ));
    }

    let decrypt_started = Instant::now();
    let (mut inner, counters) = {
        let body = reader.body(headers.transfer_encoding);
        let mut plain = DecryptingReader::new(body, enc.cipher, &cek, enc.iv_length)
            .map_err(|e| OsciError::confidentiality(FaultCode::DecryptionFailed, e.to_string()))?;
        let inner = parse_dyn(&mut plain, opts, ctx, 1)?;
        io::copy(&mut plain, &mut io::sink()).map_err(OsciError::from_read)?;
        if !plain.is_complete() {
            return Err(OsciError::confidentiality(
                FaultCode::DecryptionFailed,
                "ciphertext ended without its terminator frame",
            ));
        }
        (inner, plain.counters().clone())
    };
    if reader.next_part()?.is_some() {
        return Err(OsciError::malformed("unexpected part after the ciphertext part"));
    }

    let inner_stages = inner.timer.stage_times.total();
    inner.timer.start_time = started;
    inner.timer.add_stage_time(Stage::Parse, parse_time);
    inner.timer.add_stage_time(Stage::Decrypt, decrypt_started.elapsed().saturating_sub(inner_stages));
    inner.counters += counters;
    inner.transport_encrypted = true;
    inner.take_snapshot();
    debug!(kind = %inner.kind, cipher = enc.cipher.uri(), "transport envelope opened");
    Ok(inner)
}
