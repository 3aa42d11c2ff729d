//! Protocol constants: namespaces, algorithm identifiers, fixed content ids
//! and the streaming cipher defaults.

/// XML namespaces used on the wire, with the prefixes the composer binds
/// on the envelope root.
pub mod ns {
    pub const SOAP: &str = "http://schemas.xmlsoap.org/soap/envelope/";
    pub const OSCI: &str = "http://www.osci.de/2002/04/osci";
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
    pub const XENC: &str = "http://www.w3.org/2001/04/xmlenc#";
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

    pub const SOAP_PREFIX: &str = "soap";
    pub const OSCI_PREFIX: &str = "osci";
    pub const DS_PREFIX: &str = "ds";
    pub const XENC_PREFIX: &str = "xenc";
    pub const XSI_PREFIX: &str = "xsi";

    /// Prefix bindings declared on every composed envelope, in declaration order.
    pub const ENVELOPE_BINDINGS: &[(&str, &str)] = &[
        (SOAP_PREFIX, SOAP),
        (OSCI_PREFIX, OSCI),
        (DS_PREFIX, DS),
        (XENC_PREFIX, XENC),
        (XSI_PREFIX, XSI),
    ];
}

/// Algorithm identifiers (URIs) mirrored in signature and encryption blocks.
pub mod alg_uris {
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
    pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";
    pub const SHA3_256: &str = "http://www.w3.org/2007/05/xmldsig-more#sha3-256";
    pub const SHA3_512: &str = "http://www.w3.org/2007/05/xmldsig-more#sha3-512";

    pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
    pub const ED25519: &str = "http://www.w3.org/2021/04/xmldsig-more#eddsa-ed25519";

    pub const AES128_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes128-gcm";
    pub const AES256_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes256-gcm";

    /// Ephemeral-static X25519 agreement, HKDF-SHA256 KEK, AES-256-GCM wrap.
    pub const X25519_KEY_TRANSPORT: &str = "http://www.w3.org/2009/xmlenc11#ECDH-ES";
}

/// Schema identifier of the transport encryption envelope.
pub const SCHEMA_ENCRYPTED: &str = "soapMessageEncrypted.xsd";

/// Content id of the XML part of every multipart message.
pub const XML_PART_CID: &str = "osci@message";

/// Content id of the ciphertext part of the transport encryption envelope.
pub const ENCRYPTED_PART_CID: &str = "osci_enc";

/// Prefix of generated multipart boundaries (a random suffix follows).
pub const BOUNDARY_PREFIX: &str = "MIME_boundary_";

/// Fixed ids of the shared header parts.
pub mod part_ids {
    pub const CONTROL_BLOCK: &str = "controlblock";
    pub const CLIENT_SIGNATURE: &str = "clientsignature";
    pub const SUPPLIER_SIGNATURE: &str = "suppliersignature";
    pub const DESIRED_LANGUAGES: &str = "desiredlanguages";
    pub const INTERMEDIARY_CERTIFICATES: &str = "intermediarycertificates";
    pub const NON_INTERMEDIARY_CERTIFICATES: &str = "nonintermediarycertificates";
    pub const FEATURE_DESCRIPTION: &str = "featuredescription";
    pub const BODY: &str = "body";
}

/// IV length written by this implementation.
pub const DEFAULT_IV_LENGTH: usize = 12;

/// IV length assumed when an encryption block does not declare one.
/// Older peers always used 16-byte IVs and never wrote the declaration.
pub const LEGACY_IV_LENGTH: usize = 16;

/// IV lengths the streaming cipher accepts.
pub const ALLOWED_IV_LENGTHS: &[usize] = &[DEFAULT_IV_LENGTH, LEGACY_IV_LENGTH];

/// Default plaintext size of one streaming cipher frame (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound for a single streaming cipher frame (32 MiB).
pub const MAX_CHUNK_SIZE: usize = 32 * 1024 * 1024;

/// Symmetric content-encryption key lengths in bytes.
pub const AES128_KEY_LEN: usize = 16;
pub const AES256_KEY_LEN: usize = 32;

/// Bytes of randomness in a dialog challenge.
pub const CHALLENGE_LEN: usize = 16;

/// Line length of base64 transfer-encoded MIME bodies.
pub const BASE64_LINE_LEN: usize = 76;
