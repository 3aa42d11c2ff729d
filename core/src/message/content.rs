//! Plaintext payload trees and out-of-band attachments.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use zeroize::Zeroizing;

use crate::crypto::SymmetricCipher;
use crate::envelope::stream::EncryptingWriter;
use crate::types::{OsciError, Result};
use crate::xml::XmlElement;

pub const CID_PREFIX: &str = "cid:";

/// Strip the `cid:` scheme from an attachment reference.
pub fn strip_cid(href: &str) -> &str {
    href.strip_prefix(CID_PREFIX).unwrap_or(href)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Inline bytes, base64 on the wire.
    Data(Bytes),
    Container(ContentContainer),
    /// Reference to an attachment by ref id.
    Attachment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentContainer {
    pub ref_id: String,
    pub contents: Vec<Content>,
}

impl ContentContainer {
    pub fn new(ref_id: impl Into<String>) -> Self {
        Self { ref_id: ref_id.into(), contents: Vec::new() }
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.contents.push(Content::Data(data.into()));
        self
    }

    pub fn with_attachment(mut self, ref_id: impl Into<String>) -> Self {
        self.contents.push(Content::Attachment(ref_id.into()));
        self
    }

    pub fn with_container(mut self, child: ContentContainer) -> Self {
        self.contents.push(Content::Container(child));
        self
    }

    /// Inline data entries, depth-first.
    pub fn data(&self) -> Vec<&Bytes> {
        let mut out = Vec::new();
        for c in &self.contents {
            match c {
                Content::Data(d) => out.push(d),
                Content::Container(inner) => out.extend(inner.data()),
                Content::Attachment(_) => {}
            }
        }
        out
    }

    /// Attachment ref ids referenced anywhere below this container.
    pub fn attachment_refs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for c in &self.contents {
            match c {
                Content::Attachment(id) => out.push(id.as_str()),
                Content::Container(inner) => out.extend(inner.attachment_refs()),
                Content::Data(_) => {}
            }
        }
        out
    }

    /// Find a container by ref id in this subtree.
    pub fn find(&self, ref_id: &str) -> Option<&ContentContainer> {
        if self.ref_id == ref_id {
            return Some(self);
        }
        self.contents.iter().find_map(|c| match c {
            Content::Container(inner) => inner.find(ref_id),
            _ => None,
        })
    }

    pub fn to_xml(&self) -> XmlElement {
        let mut el = XmlElement::osci("ContentContainer").attr("RefID", self.ref_id.clone());
        for c in &self.contents {
            match c {
                Content::Data(d) => el.push(XmlElement::osci("Content").text(STANDARD.encode(d))),
                Content::Attachment(id) => {
                    el.push(XmlElement::osci("Content").attr("href", format!("{}{}", CID_PREFIX, id)))
                }
                Content::Container(inner) => el.push(XmlElement::osci("Content").child(inner.to_xml())),
            }
        }
        el
    }
}

/// Where outbound attachment bytes come from.
pub enum AttachmentSource {
    Memory(Bytes),
    /// Re-opened on every pass.
    File(PathBuf),
    /// Single pass only; cannot be signed.
    Reader(Box<dyn Read + Send>),
}

impl fmt::Debug for AttachmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentSource::Memory(b) => write!(f, "Memory({} bytes)", b.len()),
            AttachmentSource::File(p) => write!(f, "File({})", p.display()),
            AttachmentSource::Reader(_) => f.write_str("Reader"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    /// Declared in the XML, bytes not yet seen or written.
    Declared,
    /// Bound to a content key; bytes travel as ciphertext.
    Encrypted,
    /// MIME part currently being consumed.
    Parsing,
    Complete,
}

/// Key material for deterministic attachment encryption. The same key and
/// IV reproduce the same ciphertext, so signing and serializing agree.
pub struct AttachmentEncryption {
    pub cipher: SymmetricCipher,
    pub key: Zeroizing<Vec<u8>>,
    pub iv: Vec<u8>,
    pub chunk_size: usize,
}

impl fmt::Debug for AttachmentEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentEncryption")
            .field("cipher", &self.cipher)
            .field("iv_len", &self.iv.len())
            .finish()
    }
}

#[derive(Debug)]
pub struct Attachment {
    ref_id: String,
    content_type: String,
    source: Option<AttachmentSource>,
    state: AttachmentState,
    /// Bytes retained from the wire (parsed messages).
    data: Bytes,
    size: u64,
    truncated: bool,
    encryption: Option<AttachmentEncryption>,
}

impl Attachment {
    fn with_source(ref_id: impl Into<String>, content_type: impl Into<String>, source: AttachmentSource) -> Self {
        Self {
            ref_id: ref_id.into(),
            content_type: content_type.into(),
            source: Some(source),
            state: AttachmentState::Declared,
            data: Bytes::new(),
            size: 0,
            truncated: false,
            encryption: None,
        }
    }

    pub fn from_bytes(ref_id: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::with_source(ref_id, content_type, AttachmentSource::Memory(data.into()))
    }

    pub fn from_file(ref_id: impl Into<String>, content_type: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::with_source(ref_id, content_type, AttachmentSource::File(path.into()))
    }

    pub fn from_reader(
        ref_id: impl Into<String>,
        content_type: impl Into<String>,
        reader: Box<dyn Read + Send>,
    ) -> Self {
        Self::with_source(ref_id, content_type, AttachmentSource::Reader(reader))
    }

    /// Placeholder for a reference seen in inbound XML.
    pub(crate) fn declared(ref_id: impl Into<String>, encrypted: bool) -> Self {
        Self {
            ref_id: ref_id.into(),
            content_type: String::new(),
            source: None,
            state: if encrypted { AttachmentState::Encrypted } else { AttachmentState::Declared },
            data: Bytes::new(),
            size: 0,
            truncated: false,
            encryption: None,
        }
    }

    pub fn ref_id(&self) -> &str {
        &self.ref_id
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn state(&self) -> AttachmentState {
        self.state
    }

    /// Retained bytes of a parsed attachment.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Total bytes seen on the wire.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the retention cap cut the retained bytes short.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some() || self.state == AttachmentState::Encrypted
    }

    /// Whether the source can be read more than once.
    pub fn is_rereadable(&self) -> bool {
        match &self.source {
            Some(AttachmentSource::Memory(_)) | Some(AttachmentSource::File(_)) => true,
            Some(AttachmentSource::Reader(_)) => false,
            None => self.state == AttachmentState::Complete && !self.truncated,
        }
    }

    pub(crate) fn set_encryption(&mut self, enc: AttachmentEncryption) {
        self.encryption = Some(enc);
        self.state = AttachmentState::Encrypted;
    }

    pub(crate) fn begin_parsing(&mut self, content_type: &str) {
        self.content_type = content_type.to_string();
        self.state = AttachmentState::Parsing;
    }

    pub(crate) fn complete(&mut self, data: Bytes, size: u64, truncated: bool) {
        self.data = data;
        self.size = size;
        self.truncated = truncated;
        self.state = AttachmentState::Complete;
    }

    fn open(&mut self) -> io::Result<Box<dyn Read + Send + '_>> {
        match &mut self.source {
            Some(AttachmentSource::Memory(b)) => Ok(Box::new(Cursor::new(b.clone()))),
            Some(AttachmentSource::File(p)) => Ok(Box::new(File::open(p)?)),
            Some(AttachmentSource::Reader(_)) => match self.source.take() {
                Some(AttachmentSource::Reader(r)) => Ok(r),
                _ => Err(io::Error::new(io::ErrorKind::Other, "attachment source vanished")),
            },
            None if self.state == AttachmentState::Complete && !self.truncated => {
                Ok(Box::new(Cursor::new(self.data.clone())))
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("attachment {} has no readable source", self.ref_id),
            )),
        }
    }

    /// Stream the wire bytes (ciphertext when encrypted) into `out`.
    /// Returns the number of source bytes read.
    pub(crate) fn write_wire(&mut self, out: &mut dyn Write) -> Result<u64> {
        let enc = self
            .encryption
            .as_ref()
            .map(|e| (e.cipher, e.key.clone(), e.iv.clone(), e.chunk_size));
        let mut src = self.open()?;
        let n = match enc {
            Some((cipher, key, iv, chunk)) => {
                let mut w = EncryptingWriter::new(out, cipher, &key, iv, chunk)?;
                let n = io::copy(&mut src, &mut w)?;
                w.finish()?;
                n
            }
            None => io::copy(&mut src, out)?,
        };
        drop(src);
        self.size = n;
        Ok(n)
    }

    /// Plaintext copy of a parsed or in-memory attachment under a new state.
    pub(crate) fn opened(&self, plaintext: Vec<u8>) -> Self {
        let size = plaintext.len() as u64;
        Self {
            ref_id: self.ref_id.clone(),
            content_type: self.content_type.clone(),
            source: None,
            state: AttachmentState::Complete,
            data: Bytes::from(plaintext),
            size,
            truncated: false,
            encryption: None,
        }
    }

    pub(crate) fn require_rereadable(&self) -> Result<()> {
        if self.is_rereadable() {
            Ok(())
        } else {
            Err(OsciError::precondition(format!(
                "attachment {} streams from a single-pass reader and cannot be signed",
                self.ref_id
            )))
        }
    }
}
