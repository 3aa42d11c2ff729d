#[cfg(test)]
mod tests {
    use osci_core::compose::{compose, to_bytes, write_message};
    use osci_core::config::OsciConfig;
    use osci_core::envelope::DecryptContext;
    use osci_core::fault::{FaultCode, ProtocolFault};
    use osci_core::message::{
        Attachment, Content, ContentContainer, CustomHeader, EncryptedData, Inspection, InspectionResult, MessageBuilder,
        MessageKind, MessageState, ProcessCardBundle,
    };
    use osci_core::parser::{from_bytes, parse_container_xml, ParseOptions};
    use osci_core::roles::{Decrypter, LocalIdentity, RoleKind, Signer};
    use osci_core::signature::sign;
    use osci_core::telemetry::Stage;
    use osci_core::OsciError;

    fn plain_config() -> OsciConfig {
        OsciConfig { encrypt: false, ..OsciConfig::default() }
    }

    fn client() -> LocalIdentity {
        LocalIdentity::from_seeds("client", [1; 32], [2; 32])
    }

    #[test]
    fn hello_content_survives_sign_serialize_parse() {
        let cfg = plain_config();
        let signer = client();
        let mut msg = MessageBuilder::new(MessageKind::StoreDelivery)
            .content(ContentContainer::new("A").with_data("hello"))
            .build()
            .unwrap();

        let bytes = write_message(&mut msg, Some(&signer), None, Vec::new(), &cfg).unwrap();
        assert_eq!(msg.state(), MessageState::Signed);

        let parsed = from_bytes(&bytes, &ParseOptions::from(&cfg), &DecryptContext::new()).unwrap();
        assert_eq!(parsed.kind(), MessageKind::StoreDelivery);
        assert_eq!(parsed.state(), MessageState::Parsed);
        let container = parsed.content("A").expect("container A");
        let data = container.data();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].as_ref(), b"hello");
        assert!(parsed.is_signed());
        assert!(parsed.is_signature_verified());
        assert_eq!(parsed.signer_certificate(), Some(signer.signing_certificate()));
    }

    #[test]
    fn parsed_reference_set_matches_captured_digests() {
        let cfg = plain_config();
        let mut msg = MessageBuilder::new(MessageKind::StoreDelivery)
            .with_config(&cfg)
            .feature("attachments", "1.2")
            .subject("quarterly report")
            .content(ContentContainer::new("A").with_data("hello"))
            .build()
            .unwrap();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &cfg).unwrap();

        let parsed = from_bytes(&bytes, &ParseOptions::default(), &DecryptContext::new()).unwrap();
        let sig = parsed.signature().unwrap();
        let captured = parsed.captured_digests().unwrap();
        let mut referenced: Vec<&str> = sig.signed_info.references.iter().map(|r| r.uri.as_str()).collect();
        let mut hashed: Vec<&str> = captured.uris().collect();
        referenced.sort_unstable();
        hashed.sort_unstable();
        assert_eq!(referenced, hashed);
        assert!(referenced.contains(&"#controlblock"));
        assert!(referenced.contains(&"#body"));
        assert!(referenced.contains(&"#storedelivery"));
        assert!(referenced.contains(&"#desiredlanguages"));
        assert!(referenced.contains(&"#featuredescription"));
    }

    #[test]
    fn headers_round_trip() {
        let cfg = plain_config();
        let custom = CustomHeader::new(r#"<x:Trace xmlns:x="urn:example:trace" Id="trace1"><x:Hop>gw-1</x:Hop></x:Trace>"#)
            .unwrap();
        let signer = client();
        let mut msg = MessageBuilder::new(MessageKind::FetchProcessCard)
            .languages(vec!["de".into(), "en".into()])
            .feature("processcard", "1.0")
            .role(signer.role(RoleKind::Addressee))
            .custom_header(custom.clone())
            .recipient("https://supplier.example/osci")
            .build()
            .unwrap();
        let bytes = write_message(&mut msg, Some(&signer), None, Vec::new(), &cfg).unwrap();

        let parsed = from_bytes(&bytes, &ParseOptions::default(), &DecryptContext::new()).unwrap();
        assert!(parsed.is_signed());
        assert_eq!(parsed.desired_languages().unwrap().languages, vec!["de", "en"]);
        assert_eq!(parsed.features().len(), 1);
        assert_eq!(parsed.features()[0].key, "processcard");
        assert_eq!(parsed.custom_headers(), &[custom]);
        assert_eq!(parsed.type_header().recipient.as_deref(), Some("https://supplier.example/osci"));
        assert!(parsed.addressee().unwrap().cipher_certificate.is_some());
        assert_eq!(
            parsed.originator().unwrap().signature_certificate.as_ref(),
            Some(signer.signing_certificate())
        );
        assert_eq!(parsed.control_block(), msg.control_block());
    }

    #[test]
    fn response_carries_process_cards() {
        let cfg = plain_config();
        let supplier = LocalIdentity::from_seeds("supplier", [5; 32], [6; 32]);
        let request = MessageBuilder::new(MessageKind::FetchProcessCard).build().unwrap();
        let bundle = ProcessCardBundle::new("msg-0001");
        let mut response = MessageBuilder::response_to(&request, Some("conv-7".into()))
            .unwrap()
            .process_card(bundle.clone())
            .build()
            .unwrap();
        assert_eq!(response.kind(), MessageKind::ResponseToFetchProcessCard);

        let bytes = write_message(&mut response, Some(&supplier), None, Vec::new(), &cfg).unwrap();
        let parsed = from_bytes(&bytes, &ParseOptions::default(), &DecryptContext::new()).unwrap();
        assert!(parsed.is_signed());
        assert_eq!(parsed.process_cards(), &[bundle]);
        assert_eq!(parsed.control_block().response, request.control_block().challenge);
        assert_eq!(parsed.control_block().conversation_id.as_deref(), Some("conv-7"));
        assert!(parsed.intermediary().is_some());
    }

    #[test]
    fn every_kind_round_trips_unsigned() {
        let cfg = OsciConfig { sign: false, encrypt: false, ..OsciConfig::default() };
        for kind in MessageKind::all().filter(|k| !k.is_fault()) {
            let mut builder = MessageBuilder::new(kind);
            if !kind.is_request() {
                builder = builder.control_block(osci_core::message::ControlBlock {
                    conversation_id: Some("c1".into()),
                    sequence_number: None,
                    response: Some("abc".into()),
                    challenge: Some("def".into()),
                });
            } else if kind.requires_conversation_id() {
                builder = builder.control_block(osci_core::message::ControlBlock {
                    conversation_id: Some("c1".into()),
                    sequence_number: Some(3),
                    response: Some("abc".into()),
                    challenge: Some("def".into()),
                });
            }
            let mut msg = builder.build().unwrap();
            let bytes = write_message(&mut msg, None, None, Vec::new(), &cfg).unwrap();
            let parsed = from_bytes(&bytes, &ParseOptions::default(), &DecryptContext::new())
                .unwrap_or_else(|e| panic!("{}: {}", kind, e));
            assert_eq!(parsed.kind(), kind);
            assert!(!parsed.is_signed());
            assert_eq!(parsed.control_block(), msg.control_block());
        }
    }

    #[test]
    fn fault_round_trip_surfaces_protocol_fault() {
        let cfg = plain_config();
        let mut msg = MessageBuilder::fault("soap:Server", FaultCode::DialogMismatch, "challenge mismatch")
            .build()
            .unwrap();
        let bytes = write_message(&mut msg, None, None, Vec::new(), &cfg).unwrap();
        let parsed = from_bytes(&bytes, &ParseOptions::default(), &DecryptContext::new()).unwrap();

        assert_eq!(parsed.kind(), MessageKind::Fault);
        let fault = parsed.fault().unwrap();
        assert_eq!(fault.fault_code, "soap:Server");
        assert_eq!(fault.code, "9500");
        match parsed.check_fault() {
            Err(OsciError::Fault(f)) => assert_eq!(f.message, "challenge mismatch"),
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn mutation_after_signing_drops_signature() {
        let cfg = plain_config();
        let mut msg = MessageBuilder::new(MessageKind::StoreDelivery)
            .content(ContentContainer::new("A").with_data("hello"))
            .build()
            .unwrap();
        compose(&mut msg).unwrap();
        sign(&mut msg, &client(), &cfg).unwrap();
        assert!(msg.is_signed());

        msg.add_content(ContentContainer::new("B").with_data("more"));
        assert_eq!(msg.state(), MessageState::Built);
        assert!(!msg.is_signed());
        assert!(to_bytes(&mut msg, &cfg).is_err());
    }

    #[test]
    fn setters_reset_state_and_accessors_follow() {
        let cfg = plain_config();
        let reader = LocalIdentity::from_seeds("reader", [7; 32], [8; 32]);
        let mut msg = MessageBuilder::new(MessageKind::StoreDelivery)
            .role(reader.role(RoleKind::Reader))
            .attachment(Attachment::from_bytes("doc", "text/plain", &b"sealed later"[..]))
            .build()
            .unwrap();
        assert!(msg.readers()[0].has_certificates());
        assert_eq!(msg.role_certificate(RoleKind::Reader), Some(reader.cipher_certificate()));
        assert!(msg.role_certificate(RoleKind::Addressee).is_none());

        let container = ContentContainer::new("inner").with_attachment("doc");
        let sealed = EncryptedData::seal(&container, msg.attachments_mut(), &[reader.cipher_certificate()], &cfg).unwrap();
        msg.add_encrypted(sealed);
        assert!(msg.attachment("doc").unwrap().is_encrypted());

        compose(&mut msg).unwrap();
        assert_eq!(msg.state(), MessageState::Composed);
        msg.type_header_mut().subject = Some("quarterly".into());
        assert_eq!(msg.state(), MessageState::Built);

        compose(&mut msg).unwrap();
        msg.add_custom_header(CustomHeader::new(r#"<x:Tag xmlns:x="urn:x" Id="tag1">t</x:Tag>"#).unwrap());
        assert_eq!(msg.state(), MessageState::Built);

        let mut cb = msg.control_block().clone();
        cb.challenge = Some("fixed".into());
        msg.set_control_block(cb);

        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &cfg).unwrap();
        let parsed = from_bytes(&bytes, &ParseOptions::default(), &DecryptContext::new()).unwrap();
        assert_eq!(parsed.type_header().subject.as_deref(), Some("quarterly"));
        assert_eq!(parsed.custom_headers().len(), 1);
        assert_eq!(parsed.control_block().challenge.as_deref(), Some("fixed"));
        assert_eq!(parsed.open_encrypted(&reader).unwrap().len(), 1);
    }

    #[test]
    fn process_card_inspections_and_injected_fault() {
        let now = chrono::Utc::now();
        let mut bundle = ProcessCardBundle::new("m1");
        bundle.inspections.push(Inspection { reference: "body".into(), timestamp: now, result: InspectionResult::Ok });
        assert!(bundle.all_inspections_ok());
        bundle.inspections.push(Inspection {
            reference: "doc".into(),
            timestamp: now,
            result: InspectionResult::Corrupted,
        });
        assert!(!bundle.all_inspections_ok());

        let mut msg = MessageBuilder::new(MessageKind::GetMessageId).build().unwrap();
        assert!(msg.check_fault().is_ok());
        msg.set_fault(ProtocolFault { fault_code: "soap:Server".into(), code: "9000".into(), message: "down".into() });
        assert!(matches!(msg.check_fault(), Err(OsciError::Fault(_))));
        assert_eq!(msg.state(), MessageState::Built);
    }

    #[test]
    fn nested_containers_keep_their_shape() {
        let cfg = plain_config();
        let tree = ContentContainer::new("outer")
            .with_data("before")
            .with_container(
                ContentContainer::new("middle")
                    .with_container(ContentContainer::new("leaf").with_data("deep"))
                    .with_data("inside"),
            )
            .with_data("after");
        let mut msg = MessageBuilder::new(MessageKind::StoreDelivery).content(tree.clone()).build().unwrap();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &cfg).unwrap();
        let parsed = from_bytes(&bytes, &ParseOptions::default(), &DecryptContext::new()).unwrap();
        assert!(parsed.is_signed());
        assert_eq!(parsed.contents(), &[tree]);
        assert_eq!(parsed.content("leaf").unwrap().data()[0].as_ref(), b"deep");
    }

    #[test]
    fn container_without_content_wrapper_is_accepted() {
        let parsed = parse_container_xml(
            r#"<osci:ContentContainer RefID="a"><osci:Content>aGk=</osci:Content><osci:ContentContainer RefID="b"></osci:ContentContainer></osci:ContentContainer>"#,
        )
        .unwrap();
        assert_eq!(parsed.contents.len(), 2);
        assert_eq!(parsed.contents[1], Content::Container(ContentContainer::new("b")));
        assert!(parse_container_xml(
            r#"<osci:ContentContainer RefID="a"><osci:Content href="cid:x"><osci:ContentContainer RefID="b"></osci:ContentContainer></osci:Content></osci:ContentContainer>"#,
        )
        .is_err());
    }

    #[test]
    fn compose_is_idempotent() {
        let mut msg = MessageBuilder::new(MessageKind::GetMessageId).build().unwrap();
        compose(&mut msg).unwrap();
        let first = msg.parts().cloned();
        compose(&mut msg).unwrap();
        assert_eq!(msg.parts().cloned(), first);
    }

    #[test]
    fn parse_records_stage_times() {
        let cfg = plain_config();
        let mut msg = MessageBuilder::new(MessageKind::InitDialog).build().unwrap();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &cfg).unwrap();
        let sent = msg.telemetry().unwrap();
        assert!(sent.has_all_stages(&[Stage::Compose, Stage::Sign, Stage::Serialize]));
        assert!(sent.sanity_check());

        let parsed = from_bytes(&bytes, &ParseOptions::default(), &DecryptContext::new()).unwrap();
        let snap = parsed.telemetry().unwrap();
        assert!(snap.has_all_stages(&[Stage::Parse, Stage::Verify]));
        assert!(snap.sanity_check());
        assert!(snap.bytes_xml > 0);
        assert_eq!(snap.parts_digested as usize, parsed.captured_digests().unwrap().len());
    }

    #[test]
    fn verification_can_be_skipped() {
        let cfg = plain_config();
        let mut msg = MessageBuilder::new(MessageKind::InitDialog).build().unwrap();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &cfg).unwrap();
        let opts = ParseOptions { verify_signatures: false, ..ParseOptions::default() };
        let parsed = from_bytes(&bytes, &opts, &DecryptContext::new()).unwrap();
        assert!(parsed.signature().is_some());
        assert!(!parsed.is_signature_verified());
        assert!(!parsed.is_signed());
    }
}
