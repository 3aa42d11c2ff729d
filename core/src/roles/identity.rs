//! Software-held key material implementing both `Signer` and `Decrypter`.

use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::crypto::types::CryptoError;
use crate::crypto::{unwrap_key, WrappedKey};
use crate::roles::certificate::Certificate;
use crate::roles::role::{Decrypter, Role, RoleKind, Signer};

pub struct LocalIdentity {
    signing: SigningKey,
    cipher: StaticSecret,
    signature_certificate: Certificate,
    cipher_certificate: Certificate,
}

impl LocalIdentity {
    /// Fresh keys from OS entropy.
    pub fn generate(subject: &str) -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        let cipher = StaticSecret::random_from_rng(OsRng);
        Self::assemble(subject, signing, cipher)
    }

    /// Deterministic keys from 32-byte seeds.
    pub fn from_seeds(subject: &str, signing_seed: [u8; 32], cipher_seed: [u8; 32]) -> Self {
        let signing_seed = Zeroizing::new(signing_seed);
        let signing = SigningKey::from_bytes(&signing_seed);
        let cipher = StaticSecret::from(cipher_seed);
        Self::assemble(subject, signing, cipher)
    }

    fn assemble(subject: &str, signing: SigningKey, cipher: StaticSecret) -> Self {
        let signature_certificate =
            Certificate::for_signing(subject, 1, signing.verifying_key().to_bytes());
        let cipher_certificate =
            Certificate::for_cipher(subject, 2, PublicKey::from(&cipher).to_bytes());
        Self { signing, cipher, signature_certificate, cipher_certificate }
    }

    /// Public view of this identity in the given position.
    pub fn role(&self, kind: RoleKind) -> Role {
        Role::new(kind)
            .with_cipher_certificate(self.cipher_certificate.clone())
            .with_signature_certificate(self.signature_certificate.clone())
    }
}

impl Signer for LocalIdentity {
    fn signing_certificate(&self) -> &Certificate {
        &self.signature_certificate
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(self.signing.sign(data).to_bytes().to_vec())
    }
}

impl Decrypter for LocalIdentity {
    fn cipher_certificate(&self) -> &Certificate {
        &self.cipher_certificate
    }

    fn unwrap_key(&self, wrapped: &WrappedKey) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        unwrap_key(wrapped, &self.cipher)
    }
}
