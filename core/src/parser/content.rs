//! Sub-parsers for body payloads: content containers, encrypted data and
//! SOAP faults.

use bytes::Bytes;

use crate::constants::{alg_uris, ns, ALLOWED_IV_LENGTHS, LEGACY_IV_LENGTH};
use crate::crypto::WrappedKey;
use crate::envelope::cipher_from_uri;
use crate::fault::{FaultCode, ProtocolFault};
use crate::message::{strip_cid, CipherPayload, Content, ContentContainer, EncryptedData, EncryptedKey};
use crate::parser::subtree::{decode_b64, required, ElementHandler, Subtree};
use crate::roles::Certificate;
use crate::types::{OsciError, Result};
use crate::xml::{NsScope, StartTag, XmlEvent, XmlEventSource};

/// An open `Content` element.
struct OpenContent {
    href: Option<String>,
    holds_container: bool,
}

#[derive(Default)]
pub(crate) struct ContainerHandler {
    stack: Vec<ContentContainer>,
    open: Vec<OpenContent>,
    done: Option<ContentContainer>,
}

impl ElementHandler for ContainerHandler {
    fn start(&mut self, _path: &[String], tag: &StartTag) -> Result<()> {
        match tag.local.as_str() {
            "ContentContainer" => {
                if let Some(content) = self.open.last_mut() {
                    if content.href.is_some() {
                        return Err(OsciError::malformed("Content holds both href and a container"));
                    }
                    content.holds_container = true;
                }
                self.stack.push(ContentContainer::new(required(tag, "RefID")?));
            }
            "Content" => self.open.push(OpenContent {
                href: tag.attr("href").map(|h| strip_cid(h).to_string()),
                holds_container: false,
            }),
            other => return Err(OsciError::malformed(format!("unexpected {} in content container", other))),
        }
        Ok(())
    }

    fn end(&mut self, path: &[String], text: String) -> Result<()> {
        match path.last().map(String::as_str) {
            Some("Content") => {
                let open = self.open.pop().ok_or_else(|| OsciError::malformed("unbalanced Content"))?;
                // The nested container was attached to its parent when it closed.
                if open.holds_container {
                    return Ok(());
                }
                let content = match open.href {
                    Some(ref_id) => Content::Attachment(ref_id),
                    None => Content::Data(Bytes::from(decode_b64(&text, "Content")?)),
                };
                self.stack
                    .last_mut()
                    .ok_or_else(|| OsciError::malformed("content outside a container"))?
                    .contents
                    .push(content);
            }
            Some("ContentContainer") => {
                let done = self
                    .stack
                    .pop()
                    .ok_or_else(|| OsciError::malformed("unbalanced content container"))?;
                match self.stack.last_mut() {
                    Some(parent) => parent.contents.push(Content::Container(done)),
                    None => self.done = Some(done),
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl ContainerHandler {
    pub(crate) fn finish(self) -> Result<ContentContainer> {
        self.done.ok_or_else(|| OsciError::malformed("content container not closed"))
    }
}

/// Parse a standalone rendered container (decrypted payloads).
pub fn parse_container_xml(xml: &str) -> Result<ContentContainer> {
    let mut source = XmlEventSource::with_scope(xml.as_bytes(), NsScope::with_bindings(ns::ENVELOPE_BINDINGS));
    let root = match source.next_event()? {
        Some(XmlEvent::Start(tag)) if tag.is(ns::OSCI, "ContentContainer") => tag,
        _ => return Err(OsciError::malformed("decrypted payload is not a content container")),
    };
    let mut tree = Subtree::new(&root, ContainerHandler::default())?;
    while let Some(ev) = source.next_event()? {
        if tree.event(&ev)? {
            break;
        }
    }
    if source.next_event()?.is_some() {
        return Err(OsciError::malformed("data after decrypted content container"));
    }
    tree.into_inner().finish()
}

#[derive(Default)]
struct KeyInProgress {
    certificate: Option<Certificate>,
    wrapped: Option<WrappedKey>,
}

#[derive(Default)]
pub(crate) struct EncryptedDataHandler {
    id: Option<String>,
    cipher_uri: Option<String>,
    iv_length: Option<usize>,
    key: KeyInProgress,
    keys: Vec<EncryptedKey>,
    payload: Option<CipherPayload>,
    attachment_refs: Vec<String>,
}

impl ElementHandler for EncryptedDataHandler {
    fn start(&mut self, path: &[String], tag: &StartTag) -> Result<()> {
        if path.len() == 1 {
            self.id = tag.attr("Id").map(str::to_string);
            return Ok(());
        }
        let rel: Vec<&str> = path[1..].iter().map(String::as_str).collect();
        match rel.as_slice() {
            ["EncryptionMethod"] => self.cipher_uri = Some(required(tag, "Algorithm")?.to_string()),
            ["KeyInfo", "EncryptedKey"] => self.key = KeyInProgress::default(),
            ["KeyInfo", "EncryptedKey", "EncryptionMethod"] => {
                let alg = required(tag, "Algorithm")?;
                if alg != alg_uris::X25519_KEY_TRANSPORT {
                    return Err(OsciError::confidentiality(
                        FaultCode::UnsupportedAlgorithm,
                        format!("key transport {}", alg),
                    ));
                }
            }
            ["CipherData", "CipherReference"] => {
                self.payload = Some(CipherPayload::Reference(strip_cid(required(tag, "URI")?).to_string()))
            }
            ["Attachment"] => self.attachment_refs.push(strip_cid(required(tag, "href")?).to_string()),
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, path: &[String], text: String) -> Result<()> {
        let rel: Vec<&str> = path[1..].iter().map(String::as_str).collect();
        match rel.as_slice() {
            ["EncryptionMethod", "IvLength"] => {
                let n = text
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| OsciError::malformed(format!("IV length {:?}", text)))?;
                self.iv_length = Some(n);
            }
            ["KeyInfo", "EncryptedKey", "KeyInfo", "X509Data", "X509Certificate"] => {
                let cert = Certificate::from_base64(&text)
                    .map_err(|e| OsciError::malformed(format!("recipient certificate: {}", e)))?;
                self.key.certificate = Some(cert);
            }
            ["KeyInfo", "EncryptedKey", "CipherData", "CipherValue"] => {
                let raw = decode_b64(&text, "wrapped key")?;
                let wrapped = WrappedKey::from_bytes(&raw).map_err(|e| OsciError::malformed(e.to_string()))?;
                self.key.wrapped = Some(wrapped);
            }
            ["KeyInfo", "EncryptedKey"] => {
                let key = std::mem::take(&mut self.key);
                match (key.certificate, key.wrapped) {
                    (Some(recipient), Some(wrapped)) => self.keys.push(EncryptedKey { recipient, wrapped }),
                    _ => return Err(OsciError::malformed("encrypted key lacks certificate or value")),
                }
            }
            ["CipherData", "CipherValue"] => {
                self.payload = Some(CipherPayload::Inline(decode_b64(&text, "CipherValue")?));
            }
            _ => {}
        }
        Ok(())
    }
}

impl EncryptedDataHandler {
    pub(crate) fn finish(self) -> Result<EncryptedData> {
        let uri = self
            .cipher_uri
            .ok_or_else(|| OsciError::malformed("encrypted data lacks an EncryptionMethod"))?;
        let cipher = cipher_from_uri(&uri)?;
        let iv_length = self.iv_length.unwrap_or(LEGACY_IV_LENGTH);
        if !ALLOWED_IV_LENGTHS.contains(&iv_length) {
            return Err(OsciError::malformed(format!("IV length {} not supported", iv_length)));
        }
        if self.keys.is_empty() {
            return Err(OsciError::malformed("encrypted data carries no encrypted key"));
        }
        let payload = self
            .payload
            .ok_or_else(|| OsciError::malformed("encrypted data lacks CipherData"))?;
        Ok(EncryptedData {
            id: self.id,
            cipher,
            iv_length,
            keys: self.keys,
            payload,
            attachment_refs: self.attachment_refs,
        })
    }
}

#[derive(Default)]
pub(crate) struct FaultHandler {
    fault_code: String,
    message: String,
    code: Option<String>,
}

impl ElementHandler for FaultHandler {
    fn start(&mut self, _path: &[String], _tag: &StartTag) -> Result<()> {
        Ok(())
    }

    fn end(&mut self, path: &[String], text: String) -> Result<()> {
        let rel: Vec<&str> = path.iter().map(String::as_str).collect();
        match rel.as_slice() {
            ["Fault", "faultcode"] => self.fault_code = text,
            ["Fault", "faultstring"] => self.message = text,
            ["Fault", "detail", "Code"] => self.code = Some(text),
            _ => {}
        }
        Ok(())
    }
}

impl FaultHandler {
    pub(crate) fn finish(self) -> ProtocolFault {
        ProtocolFault {
            fault_code: self.fault_code,
            code: self.code.unwrap_or_else(|| FaultCode::Unspecified.as_str()),
            message: self.message,
        }
    }
}
