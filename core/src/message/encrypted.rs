//! Encrypted data entries: content containers sealed for reader certificates.
//!
//! Layout of an entry:
//!
//! ```text
//! xenc:EncryptedData
//!   xenc:EncryptionMethod Algorithm=<cipher>   (osci:IvLength child)
//!   ds:KeyInfo
//!     xenc:EncryptedKey*                       one per recipient
//!   xenc:CipherData
//!     xenc:CipherValue | xenc:CipherReference URI="cid:..."
//!   osci:Attachment href="cid:..."*            attachments sealed with the same key
//! ```
//!
//! The payload is the streaming cipher applied to the rendered container.
//! Attachments use the same content key with their own IV.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::OsciConfig;
use crate::constants::alg_uris;
use crate::crypto::{generate_content_key, random_iv, wrap_key, SymmetricCipher, WrappedKey};
use crate::envelope::stream::{decrypt_to_vec, encrypt_to_vec};
use crate::fault::FaultCode;
use crate::message::content::{Attachment, AttachmentEncryption, ContentContainer, CID_PREFIX};
use crate::message::headers::x509_data;
use crate::roles::{Certificate, Decrypter};
use crate::types::{OsciError, Result};
use crate::xml::XmlElement;

/// Content key wrapped for one recipient certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedKey {
    pub recipient: Certificate,
    pub wrapped: WrappedKey,
}

impl EncryptedKey {
    pub fn to_xml(&self) -> Result<XmlElement> {
        Ok(XmlElement::xenc("EncryptedKey")
            .child(XmlElement::xenc("EncryptionMethod").attr("Algorithm", alg_uris::X25519_KEY_TRANSPORT))
            .child(XmlElement::ds("KeyInfo").child(x509_data(&self.recipient)?))
            .child(
                XmlElement::xenc("CipherData")
                    .child(XmlElement::xenc("CipherValue").text(STANDARD.encode(self.wrapped.to_bytes()))),
            ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherPayload {
    /// Ciphertext carried inline, base64 on the wire.
    Inline(Vec<u8>),
    /// Ciphertext carried in the MIME part with this content id.
    Reference(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    pub id: Option<String>,
    pub cipher: SymmetricCipher,
    /// IV length of the payload stream.
    pub iv_length: usize,
    pub keys: Vec<EncryptedKey>,
    pub payload: CipherPayload,
    /// Ref ids of attachments sealed under the same content key.
    pub attachment_refs: Vec<String>,
}

/// Result of opening an encrypted data entry.
#[derive(Debug)]
pub struct OpenedContent {
    pub container: ContentContainer,
    pub attachments: Vec<Attachment>,
}

pub(crate) fn wrap_for(cek: &[u8], recipients: &[&Certificate]) -> Result<Vec<EncryptedKey>> {
    if recipients.is_empty() {
        return Err(OsciError::precondition("encryption requires at least one recipient certificate"));
    }
    let mut keys = Vec::with_capacity(recipients.len());
    for cert in recipients {
        if !cert.key_usage().permits_key_transport() {
            return Err(OsciError::precondition(format!(
                "certificate {} may not be used for key transport",
                cert.subject()
            )));
        }
        let wrapped = wrap_key(cek, cert.cipher_public_key()?)?;
        keys.push(EncryptedKey { recipient: (*cert).clone(), wrapped });
    }
    Ok(keys)
}

/// Find the entry wrapped for `decrypter` and recover the content key.
pub(crate) fn unwrap_for(keys: &[EncryptedKey], decrypter: &dyn Decrypter) -> Result<Zeroizing<Vec<u8>>> {
    let own = decrypter.cipher_certificate().fingerprint()?;
    for key in keys {
        if key.recipient.fingerprint()? == own {
            return decrypter
                .unwrap_key(&key.wrapped)
                .map_err(|e| OsciError::confidentiality(FaultCode::DecryptionFailed, e.to_string()));
        }
    }
    Err(OsciError::confidentiality(
        FaultCode::NoMatchingPrivateKey,
        format!("no encrypted key for {}", decrypter.cipher_certificate().subject()),
    ))
}

impl EncryptedData {
    /// Seal `container` for `recipients`. Attachments it references are bound
    /// to the same content key and will be written as ciphertext.
    pub fn seal(
        container: &ContentContainer,
        attachments: &mut [Attachment],
        recipients: &[&Certificate],
        cfg: &OsciConfig,
    ) -> Result<Self> {
        let cek = generate_content_key(cfg.cipher);
        let keys = wrap_for(&cek, recipients)?;

        let plaintext = container.to_xml().render();
        let iv = random_iv(cfg.iv_length)?;
        let ciphertext = encrypt_to_vec(cfg.cipher, &cek, iv, cfg.chunk_size, plaintext.as_bytes())?;

        let mut attachment_refs = Vec::new();
        for ref_id in container.attachment_refs() {
            let att = attachments
                .iter_mut()
                .find(|a| a.ref_id() == ref_id)
                .ok_or_else(|| OsciError::precondition(format!("container references unknown attachment {}", ref_id)))?;
            att.set_encryption(AttachmentEncryption {
                cipher: cfg.cipher,
                key: cek.clone(),
                iv: random_iv(cfg.iv_length)?,
                chunk_size: cfg.chunk_size,
            });
            attachment_refs.push(ref_id.to_string());
        }

        debug!(
            container = %container.ref_id,
            recipients = recipients.len(),
            attachments = attachment_refs.len(),
            "sealed content container"
        );
        Ok(Self {
            id: None,
            cipher: cfg.cipher,
            iv_length: cfg.iv_length,
            keys,
            payload: CipherPayload::Inline(ciphertext),
            attachment_refs,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Whether a key was wrapped for `cert`.
    pub fn is_addressed_to(&self, cert: &Certificate) -> bool {
        match cert.fingerprint() {
            Ok(fp) => self.keys.iter().any(|k| k.recipient.fingerprint().map(|f| f == fp).unwrap_or(false)),
            Err(_) => false,
        }
    }

    /// Decrypt with the key wrapped for `decrypter`. Referenced attachments
    /// must have been received in full.
    pub fn open(&self, decrypter: &dyn Decrypter, attachments: &[Attachment]) -> Result<OpenedContent> {
        let ciphertext = match &self.payload {
            CipherPayload::Inline(ct) => ct,
            CipherPayload::Reference(cid) => {
                return Err(OsciError::precondition(format!(
                    "payload travels in MIME part {} and is opened by the transport envelope",
                    cid
                )))
            }
        };
        let cek = unwrap_for(&self.keys, decrypter)?;
        let plaintext = decrypt_to_vec(self.cipher, &cek, self.iv_length, ciphertext)
            .map_err(|e| OsciError::confidentiality(FaultCode::DecryptionFailed, e.to_string()))?;
        let xml = String::from_utf8(plaintext).map_err(|e| OsciError::malformed(e.to_string()))?;
        let container = crate::parser::parse_container_xml(&xml)?;

        let mut opened = Vec::with_capacity(self.attachment_refs.len());
        for ref_id in &self.attachment_refs {
            let att = attachments.iter().find(|a| a.ref_id() == ref_id).ok_or_else(|| {
                OsciError::parse(FaultCode::AttachmentMissing, format!("encrypted attachment {} missing", ref_id))
            })?;
            if att.is_truncated() {
                return Err(OsciError::precondition(format!(
                    "attachment {} was truncated by the retention cap and cannot be decrypted",
                    ref_id
                )));
            }
            let plain = decrypt_to_vec(self.cipher, &cek, self.iv_length, att.data())
                .map_err(|e| OsciError::confidentiality(FaultCode::DecryptionFailed, e.to_string()))?;
            opened.push(att.opened(plain));
        }

        debug!(container = %container.ref_id, attachments = opened.len(), "opened encrypted data");
        Ok(OpenedContent { container, attachments: opened })
    }

    pub fn to_xml(&self) -> Result<XmlElement> {
        let method = XmlElement::xenc("EncryptionMethod")
            .attr("Algorithm", self.cipher.uri())
            .child(XmlElement::osci("IvLength").text(self.iv_length.to_string()));

        let mut key_info = XmlElement::ds("KeyInfo");
        for key in &self.keys {
            key_info.push(key.to_xml()?);
        }

        let cipher_data = match &self.payload {
            CipherPayload::Inline(ct) => {
                XmlElement::xenc("CipherData").child(XmlElement::xenc("CipherValue").text(STANDARD.encode(ct)))
            }
            CipherPayload::Reference(cid) => XmlElement::xenc("CipherData")
                .child(XmlElement::xenc("CipherReference").attr("URI", format!("{}{}", CID_PREFIX, cid))),
        };

        Ok(XmlElement::xenc("EncryptedData")
            .attr_opt("Id", self.id.clone())
            .child(method)
            .child(key_info)
            .child(cipher_data)
            .children(
                self.attachment_refs
                    .iter()
                    .map(|r| XmlElement::osci("Attachment").attr("href", format!("{}{}", CID_PREFIX, r))),
            ))
    }
}
