//! Sub-parser for the signature header.

use std::collections::HashMap;

use crate::crypto::DigestAlg;
use crate::parser::subtree::{decode_b64, ends_with, is_path, required, ElementHandler};
use crate::roles::Certificate;
use crate::signature::{Reference, SignatureBlock, SignedInfo};
use crate::types::{OsciError, Result};
use crate::xml::StartTag;

#[derive(Default)]
pub(crate) struct SignatureHandler {
    header: String,
    id: String,
    signature_seen: bool,
    signed_info_seen: bool,
    canonicalization: Option<String>,
    signature_method: Option<String>,
    references: Vec<(String, Option<DigestAlg>, Option<Vec<u8>>)>,
    signature_value: Option<Vec<u8>>,
    certificate: Option<Certificate>,
}

impl ElementHandler for SignatureHandler {
    fn start(&mut self, path: &[String], tag: &StartTag) -> Result<()> {
        if path.len() == 1 {
            self.header = tag.local.clone();
            self.id = required(tag, "Id")?.to_string();
            return Ok(());
        }
        let rel: Vec<&str> = path[1..].iter().map(String::as_str).collect();
        match rel.as_slice() {
            ["Signature"] => once(&mut self.signature_seen, "ds:Signature")?,
            ["Signature", "SignedInfo"] => once(&mut self.signed_info_seen, "ds:SignedInfo")?,
            ["Signature", "SignedInfo", "CanonicalizationMethod"] => {
                set_once(&mut self.canonicalization, required(tag, "Algorithm")?.to_string(), "CanonicalizationMethod")?
            }
            ["Signature", "SignedInfo", "SignatureMethod"] => {
                set_once(&mut self.signature_method, required(tag, "Algorithm")?.to_string(), "SignatureMethod")?
            }
            ["Signature", "SignedInfo", "Reference"] => {
                self.references.push((required(tag, "URI")?.to_string(), None, None))
            }
            ["Signature", "SignedInfo", "Reference", "DigestMethod"] => {
                let alg = DigestAlg::from_uri(required(tag, "Algorithm")?)?;
                if let Some(r) = self.references.last_mut() {
                    r.1 = Some(alg);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, path: &[String], text: String) -> Result<()> {
        if ends_with(path, &["Reference", "DigestValue"]) {
            let value = decode_b64(&text, "DigestValue")?;
            if let Some(r) = self.references.last_mut() {
                r.2 = Some(value);
            }
        } else if is_path(&path[1..], &["Signature", "SignatureValue"]) {
            set_once(&mut self.signature_value, decode_b64(&text, "SignatureValue")?, "SignatureValue")?;
        } else if ends_with(path, &["KeyInfo", "X509Data", "X509Certificate"]) {
            let cert = Certificate::from_base64(&text)
                .map_err(|e| OsciError::malformed(format!("signer certificate: {}", e)))?;
            set_once(&mut self.certificate, cert, "X509Certificate")?;
        }
        Ok(())
    }
}

fn once(seen: &mut bool, what: &str) -> Result<()> {
    if std::mem::replace(seen, true) {
        return Err(OsciError::malformed(format!("signature header holds more than one {}", what)));
    }
    Ok(())
}

fn set_once<T>(slot: &mut Option<T>, value: T, what: &str) -> Result<()> {
    if slot.is_some() {
        return Err(OsciError::malformed(format!("signature header holds more than one {}", what)));
    }
    *slot = Some(value);
    Ok(())
}

impl SignatureHandler {
    pub(crate) fn finish(self) -> Result<SignatureBlock> {
        let missing = |what: &str| OsciError::malformed(format!("signature lacks {}", what));
        let mut references = Vec::with_capacity(self.references.len());
        for (uri, alg, digest) in self.references {
            references.push(Reference {
                digest_alg: alg.ok_or_else(|| missing("a DigestMethod"))?,
                digest: digest.ok_or_else(|| missing("a DigestValue"))?,
                uri,
            });
        }
        Ok(SignatureBlock {
            header: self.header,
            id: self.id,
            signed_info: SignedInfo {
                canonicalization: self.canonicalization.ok_or_else(|| missing("CanonicalizationMethod"))?,
                signature_method: self.signature_method.ok_or_else(|| missing("SignatureMethod"))?,
                references,
            },
            signature_value: self.signature_value.ok_or_else(|| missing("SignatureValue"))?,
            certificate: self.certificate.ok_or_else(|| missing("a certificate"))?,
        })
    }
}

/// Digest algorithm per reference uri, for the collector.
pub(crate) fn reference_algorithms(block: &SignatureBlock) -> HashMap<String, DigestAlg> {
    block
        .signed_info
        .references
        .iter()
        .map(|r| (r.uri.clone(), r.digest_alg))
        .collect()
}
