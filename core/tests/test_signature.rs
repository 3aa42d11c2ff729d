#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use osci_core::compose::{compose, write_message};
    use osci_core::config::OsciConfig;
    use osci_core::crypto::{CryptoError, DigestAlg};
    use osci_core::envelope::DecryptContext;
    use osci_core::fault::FaultCode;
    use osci_core::message::{ContentContainer, MessageBuilder, MessageKind};
    use osci_core::parser::{from_bytes, ParseOptions};
    use osci_core::roles::{Certificate, KeyUsage, LocalIdentity, Signer};
    use osci_core::signature::sign;
    use osci_core::OsciError;

    fn plain_config() -> OsciConfig {
        OsciConfig { encrypt: false, ..OsciConfig::default() }
    }

    fn client() -> LocalIdentity {
        LocalIdentity::from_seeds("client", [1; 32], [2; 32])
    }

    fn signed_delivery(cfg: &OsciConfig) -> Vec<u8> {
        let mut msg = MessageBuilder::new(MessageKind::StoreDelivery)
            .feature("attachments", "1.2")
            .content(ContentContainer::new("A").with_data("hello"))
            .build()
            .unwrap();
        write_message(&mut msg, Some(&client()), None, Vec::new(), cfg).unwrap()
    }

    fn parse(bytes: &[u8]) -> osci_core::Result<osci_core::message::OsciMessage> {
        from_bytes(bytes, &ParseOptions::default(), &DecryptContext::new())
    }

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn assert_signature_invalid(result: osci_core::Result<osci_core::message::OsciMessage>) {
        match result {
            Err(e @ OsciError::SignatureInvalid(_)) => assert_eq!(e.fault_code(), FaultCode::SignatureInvalid),
            Err(other) => panic!("expected SignatureInvalid, got {}", other),
            Ok(_) => panic!("tampered message verified"),
        }
    }

    /// Signer whose certificate carries the given usages.
    struct RestrictedSigner {
        inner: LocalIdentity,
        cert: Certificate,
    }

    impl Signer for RestrictedSigner {
        fn signing_certificate(&self) -> &Certificate {
            &self.cert
        }

        fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
            self.inner.sign(data)
        }
    }

    #[test]
    fn every_digest_algorithm_verifies() {
        for alg in [DigestAlg::Sha256, DigestAlg::Sha512, DigestAlg::Sha3_256, DigestAlg::Sha3_512] {
            let cfg = OsciConfig { digest: alg, ..plain_config() };
            let parsed = parse(&signed_delivery(&cfg)).unwrap();
            assert!(parsed.is_signed(), "{:?}", alg);
            let sig = parsed.signature().unwrap();
            assert!(sig.signed_info.references.iter().all(|r| r.digest_alg == alg));
            assert!(sig.signed_info.references.iter().all(|r| r.digest.len() == alg.output_len()));
        }
    }

    #[test]
    fn changed_content_is_detected() {
        let text = as_text(&signed_delivery(&plain_config()));
        // base64("hello") -> base64("hellp")
        assert!(text.contains("aGVsbG8="));
        let tampered = text.replacen("aGVsbG8=", "aGVsbHA=", 1);
        assert_signature_invalid(parse(tampered.as_bytes()));
    }

    #[test]
    fn removed_reference_is_detected() {
        let text = as_text(&signed_delivery(&plain_config()));
        let start = text.find("<ds:Reference URI=\"#featuredescription\">").unwrap();
        let end = start + text[start..].find("</ds:Reference>").unwrap() + "</ds:Reference>".len();
        let mut tampered = text.clone();
        tampered.replace_range(start..end, "");
        assert_signature_invalid(parse(tampered.as_bytes()));
    }

    #[test]
    fn unreferenced_extra_header_is_detected() {
        let text = as_text(&signed_delivery(&plain_config()));
        let tampered = text.replacen(
            "</soap:Header>",
            "<x:Extra xmlns:x=\"urn:example:extra\" Id=\"extra\">late</x:Extra></soap:Header>",
            1,
        );
        assert_signature_invalid(parse(tampered.as_bytes()));
    }

    #[test]
    fn swapped_signature_value_is_detected() {
        let cfg = plain_config();
        let a = as_text(&signed_delivery(&cfg));
        let b = as_text(&signed_delivery(&cfg));
        let value = |t: &str| {
            let s = t.find("<ds:SignatureValue>").unwrap() + "<ds:SignatureValue>".len();
            let e = s + t[s..].find("</ds:SignatureValue>").unwrap();
            t[s..e].to_string()
        };
        // Fresh challenges make the two SignedInfos differ.
        let (va, vb) = (value(&a), value(&b));
        assert_ne!(va, vb);
        let tampered = a.replacen(&va, &vb, 1);
        assert_signature_invalid(parse(tampered.as_bytes()));
    }

    #[test]
    fn signer_without_signing_usage_cannot_sign() {
        let inner = client();
        let cert = inner.signing_certificate().clone().with_key_usage(KeyUsage::KEY_AGREEMENT);
        let signer = RestrictedSigner { inner, cert };
        let mut msg = MessageBuilder::new(MessageKind::InitDialog).build().unwrap();
        compose(&mut msg).unwrap();
        assert!(matches!(sign(&mut msg, &signer, &plain_config()), Err(OsciError::Precondition(_))));
    }

    #[test]
    fn key_usage_is_checked_on_verify() {
        let signer = client();
        let cert = signer.signing_certificate().clone();
        let text = as_text(&signed_delivery(&plain_config()));
        let original = cert.to_base64().unwrap();
        let restricted = cert.with_key_usage(KeyUsage::KEY_ENCIPHERMENT).to_base64().unwrap();
        // The first copy is the signer certificate inside the signature header.
        let key_info = text.find("<ds:KeyInfo>").unwrap();
        assert!(text.find(&original).unwrap() > key_info);
        let tampered = text.replacen(&original, &restricted, 1);
        assert_signature_invalid(parse(tampered.as_bytes()));
    }

    #[test]
    fn non_repudiation_alone_may_sign() {
        let inner = client();
        let cert = inner.signing_certificate().clone().with_key_usage(KeyUsage::NON_REPUDIATION);
        let signer = RestrictedSigner { inner, cert };
        let mut msg = MessageBuilder::new(MessageKind::InitDialog).build().unwrap();
        let bytes = write_message(&mut msg, Some(&signer), None, Vec::new(), &plain_config()).unwrap();
        assert!(parse(&bytes).unwrap().is_signed());
    }

    #[test]
    fn faults_are_never_signed() {
        let mut msg = MessageBuilder::fault("soap:Client", FaultCode::MessageMalformed, "bad").build().unwrap();
        compose(&mut msg).unwrap();
        assert!(matches!(sign(&mut msg, &client(), &plain_config()), Err(OsciError::Precondition(_))));
    }

    fn assert_malformed(result: osci_core::Result<osci_core::message::OsciMessage>) {
        match result {
            Err(e @ OsciError::Parse { .. }) => assert_eq!(e.fault_code(), FaultCode::MessageMalformed, "{}", e),
            Err(other) => panic!("expected MessageMalformed, got {}", other),
            Ok(_) => panic!("repeated signature element accepted"),
        }
    }

    fn element_span(text: &str, open: &str, close: &str) -> std::ops::Range<usize> {
        let start = text.find(open).unwrap();
        start..start + text[start..].find(close).unwrap() + close.len()
    }

    #[test]
    fn second_signature_in_header_is_rejected() {
        let text = as_text(&signed_delivery(&plain_config()));
        let span = element_span(&text, "<ds:Signature", "</ds:Signature>");
        let mut tampered = text.clone();
        tampered.insert_str(span.end, &text[span]);
        assert_malformed(parse(tampered.as_bytes()));
    }

    #[test]
    fn repeated_signature_parts_are_rejected() {
        let text = as_text(&signed_delivery(&plain_config()));
        for (open, close) in [
            ("<ds:SignedInfo", "</ds:SignedInfo>"),
            ("<ds:SignatureValue", "</ds:SignatureValue>"),
            ("<ds:X509Certificate", "</ds:X509Certificate>"),
        ] {
            let span = element_span(&text, open, close);
            let mut tampered = text.clone();
            tampered.insert_str(span.end, &text[span]);
            assert_malformed(parse(tampered.as_bytes()));
        }
    }

    #[test]
    fn sign_requires_composed_message() {
        let mut msg = MessageBuilder::new(MessageKind::InitDialog).build().unwrap();
        assert!(matches!(sign(&mut msg, &client(), &plain_config()), Err(OsciError::Precondition(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_body_byte_flip_is_rejected(pos in any::<proptest::sample::Index>(), mask in 1u8..=255) {
            let bytes = signed_delivery(&plain_config());
            let text = as_text(&bytes);
            let start = text.find("<soap:Body").unwrap();
            let end = text.find("</soap:Body>").unwrap() + "</soap:Body>".len();
            let i = start + pos.index(end - start);
            // Whitespace inside a tag is not significant after canonicalization.
            prop_assume!(!bytes[i].is_ascii_whitespace());

            let mut tampered = bytes.clone();
            tampered[i] ^= mask;
            prop_assert!(parse(&tampered).is_err());
        }
    }
}
