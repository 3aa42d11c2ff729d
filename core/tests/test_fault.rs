#[cfg(test)]
mod tests {
    use osci_core::compose::write_message;
    use osci_core::config::OsciConfig;
    use osci_core::crypto::CryptoError;
    use osci_core::envelope::DecryptContext;
    use osci_core::fault::{DefaultTextResources, FaultCode, ProtocolFault, TextResources};
    use osci_core::message::{Feedback, MessageBuilder, MessageKind};
    use osci_core::parser::{from_bytes, ParseOptions};
    use osci_core::OsciError;

    #[test]
    fn codes_travel_as_decimal_strings() {
        assert_eq!(FaultCode::SignatureInvalid.as_str(), "9200");
        assert_eq!(FaultCode::DialogMismatch.to_string(), "9500");
        assert_eq!(FaultCode::parse(" 9101 "), Some(FaultCode::NoMatchingPrivateKey));
        assert_eq!(FaultCode::parse("9999"), Some(FaultCode::Unspecified));
        assert_eq!(FaultCode::parse("abc"), None);
    }

    #[test]
    fn every_code_has_default_text() {
        let texts = DefaultTextResources::default();
        for code in 9000u16..9600 {
            if let Ok(fc) = FaultCode::try_from(code) {
                assert!(texts.lookup(&fc.as_str()).is_some(), "{}", fc);
            }
        }
        assert_eq!(texts.describe("1234"), "unknown fault code 1234");
    }

    #[test]
    fn texts_can_be_localized() {
        let mut texts = DefaultTextResources::default();
        texts.insert("9200", "Signaturprüfung fehlgeschlagen");
        let entry = Feedback::from_code(FaultCode::SignatureInvalid, "de", &texts);
        assert_eq!(entry.code, "9200");
        assert_eq!(entry.language, "de");
        assert_eq!(entry.text, "Signaturprüfung fehlgeschlagen");

        // Unknown codes fall back to the text that came over the wire.
        let remote = Feedback { language: "en".into(), code: "0815".into(), text: "custom".into() };
        assert_eq!(remote.describe(&texts), "custom");
        assert_eq!(entry.describe(&DefaultTextResources::default()), "signature verification failed");
    }

    #[test]
    fn feedback_round_trips_in_a_response() {
        let cfg = OsciConfig { sign: false, encrypt: false, ..OsciConfig::default() };
        let texts = DefaultTextResources::default();
        let request = MessageBuilder::new(MessageKind::StoreDelivery).build().unwrap();
        let entries = vec![
            Feedback::from_code(FaultCode::Unspecified, "en", &texts),
            Feedback { language: "de".into(), code: "0801".into(), text: "Nachricht gespeichert".into() },
        ];
        let mut builder = MessageBuilder::response_to(&request, None).unwrap();
        for e in &entries {
            builder = builder.feedback(e.clone());
        }
        let mut response = builder.build().unwrap();
        let bytes = write_message(&mut response, None, None, Vec::new(), &cfg).unwrap();
        let parsed = from_bytes(&bytes, &ParseOptions::default(), &DecryptContext::new()).unwrap();
        assert_eq!(parsed.feedback(), entries.as_slice());
    }

    #[test]
    fn errors_map_to_fault_codes() {
        assert_eq!(OsciError::malformed("x").fault_code(), FaultCode::MessageMalformed);
        assert_eq!(OsciError::SignatureInvalid("x".into()).fault_code(), FaultCode::SignatureInvalid);
        assert_eq!(
            OsciError::from(CryptoError::UnsupportedCipher { uri: "urn:x".into() }).fault_code(),
            FaultCode::UnsupportedAlgorithm
        );
        assert_eq!(OsciError::from(CryptoError::TagMismatch).fault_code(), FaultCode::DecryptionFailed);
        assert_eq!(OsciError::precondition("x").fault_code(), FaultCode::Unspecified);

        let fault = ProtocolFault { fault_code: "soap:Client".into(), code: "9403".into(), message: "dup".into() };
        assert_eq!(fault.to_string(), "soap:Client [9403]: dup");
        assert_eq!(OsciError::Fault(fault).fault_code(), FaultCode::DuplicateId);
    }

    #[test]
    fn fault_needs_its_payload_and_nothing_else() {
        assert!(MessageBuilder::new(MessageKind::Fault).build().is_err());
        let fault = MessageBuilder::fault("soap:Server", FaultCode::Unspecified, "boom").build().unwrap();
        assert!(fault.check_fault().is_err());
        let plain = MessageBuilder::new(MessageKind::GetMessageId).build().unwrap();
        assert!(plain.check_fault().is_ok());
    }
}
