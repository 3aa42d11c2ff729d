//! Signature block model and rendering.
//!
//! ```text
//! osci:ClientSignature | osci:SupplierSignature  Id=...
//!   ds:Signature
//!     ds:SignedInfo
//!       ds:CanonicalizationMethod Algorithm=exc-c14n
//!       ds:SignatureMethod Algorithm=...
//!       ds:Reference URI="#id" | "cid:ref"*
//!         ds:DigestMethod Algorithm=...
//!         ds:DigestValue  (base64)
//!     ds:SignatureValue   (base64)
//!     ds:KeyInfo/ds:X509Data/ds:X509Certificate
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::constants::{alg_uris, ns};
use crate::crypto::DigestAlg;
use crate::message::x509_data;
use crate::roles::Certificate;
use crate::types::{OsciError, Result};
use crate::xml::{canonicalize_fragment, XmlElement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// `#id` for XML parts, `cid:ref` for attachments.
    pub uri: String,
    pub digest_alg: DigestAlg,
    pub digest: Vec<u8>,
}

impl Reference {
    pub fn to_xml(&self) -> XmlElement {
        XmlElement::ds("Reference")
            .attr("URI", self.uri.clone())
            .child(XmlElement::ds("DigestMethod").attr("Algorithm", self.digest_alg.uri()))
            .child(XmlElement::ds("DigestValue").text(STANDARD.encode(&self.digest)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInfo {
    pub canonicalization: String,
    pub signature_method: String,
    pub references: Vec<Reference>,
}

impl SignedInfo {
    pub fn new(signature_method: &str, references: Vec<Reference>) -> Self {
        Self {
            canonicalization: alg_uris::EXC_C14N.to_string(),
            signature_method: signature_method.to_string(),
            references,
        }
    }

    pub fn reference(&self, uri: &str) -> Option<&Reference> {
        self.references.iter().find(|r| r.uri == uri)
    }

    pub fn to_xml(&self) -> XmlElement {
        XmlElement::ds("SignedInfo")
            .child(XmlElement::ds("CanonicalizationMethod").attr("Algorithm", self.canonicalization.clone()))
            .child(XmlElement::ds("SignatureMethod").attr("Algorithm", self.signature_method.clone()))
            .children(self.references.iter().map(Reference::to_xml))
    }

    /// Canonical bytes the signature value is computed over.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(canonicalize_fragment(&self.to_xml().render(), ns::ENVELOPE_BINDINGS)?)
    }
}

/// An enveloped signature as carried in the signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBlock {
    /// Local name of the enclosing header element.
    pub header: String,
    pub id: String,
    pub signed_info: SignedInfo,
    pub signature_value: Vec<u8>,
    pub certificate: Certificate,
}

impl SignatureBlock {
    pub fn to_xml(&self) -> Result<XmlElement> {
        let signature = XmlElement::ds("Signature")
            .child(self.signed_info.to_xml())
            .child(XmlElement::ds("SignatureValue").text(STANDARD.encode(&self.signature_value)))
            .child(XmlElement::ds("KeyInfo").child(x509_data(&self.certificate)?));
        Ok(XmlElement::osci(&self.header).attr("Id", self.id.clone()).child(signature))
    }
}

/// Digests recorded while a message streamed in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedDigests {
    /// (reference uri, algorithm, digest) in arrival order.
    pub digests: Vec<(String, DigestAlg, Vec<u8>)>,
    /// Canonical bytes of `ds:SignedInfo` as received.
    pub signed_info: Option<Vec<u8>>,
}

impl CapturedDigests {
    pub fn get(&self, uri: &str) -> Option<(DigestAlg, &[u8])> {
        self.digests
            .iter()
            .find(|(u, _, _)| u == uri)
            .map(|(_, alg, d)| (*alg, d.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.digests.iter().map(|(u, _, _)| u.as_str())
    }

    pub(crate) fn push(&mut self, uri: String, alg: DigestAlg, digest: Vec<u8>) -> Result<()> {
        if self.get(&uri).is_some() {
            return Err(OsciError::parse(
                crate::fault::FaultCode::DuplicateId,
                format!("{} hashed twice", uri),
            ));
        }
        self.digests.push((uri, alg, digest));
        Ok(())
    }
}
