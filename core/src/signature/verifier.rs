//! Verification against digests captured during parsing.
//!
//! Checks, in order, any failure ending the check:
//! 1. every referenced uri has a captured digest of equal value
//! 2. the reference count equals the captured count
//! 3. the signature value verifies over the captured SignedInfo bytes
//! 4. the signer certificate permits signing

use tracing::{debug, warn};

use crate::constants::alg_uris;
use crate::signature::signed_info::{CapturedDigests, SignatureBlock};
use crate::types::{OsciError, Result};

fn invalid(detail: impl Into<String>) -> OsciError {
    let detail = detail.into();
    warn!(%detail, "signature rejected");
    OsciError::SignatureInvalid(detail)
}

pub fn verify_signature(block: &SignatureBlock, captured: &CapturedDigests) -> Result<()> {
    if block.signed_info.canonicalization != alg_uris::EXC_C14N {
        return Err(invalid(format!("unsupported canonicalization {}", block.signed_info.canonicalization)));
    }
    if block.signed_info.signature_method != alg_uris::ED25519 {
        return Err(invalid(format!("unsupported signature method {}", block.signed_info.signature_method)));
    }

    for reference in &block.signed_info.references {
        match captured.get(&reference.uri) {
            Some((alg, value)) if alg == reference.digest_alg && value == reference.digest.as_slice() => {}
            Some(_) => return Err(invalid(format!("digest mismatch for {}", reference.uri))),
            None => return Err(invalid(format!("referenced part {} was not hashed", reference.uri))),
        }
    }

    if block.signed_info.references.len() != captured.len() {
        return Err(invalid(format!(
            "{} references but {} hashed parts",
            block.signed_info.references.len(),
            captured.len()
        )));
    }

    let signed_info = captured
        .signed_info
        .as_deref()
        .ok_or_else(|| invalid("SignedInfo was not captured"))?;
    block
        .certificate
        .verify(signed_info, &block.signature_value)
        .map_err(|e| invalid(format!("signature value: {}", e)))?;

    if !block.certificate.key_usage().permits_signing() {
        return Err(invalid(format!("certificate {} may not sign", block.certificate.subject())));
    }

    debug!(references = captured.len(), signer = block.certificate.subject(), "signature verified");
    Ok(())
}
