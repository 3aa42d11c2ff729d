#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use osci_core::compose::{compose, to_bytes, write_message};
    use osci_core::config::OsciConfig;
    use osci_core::envelope::DecryptContext;
    use osci_core::fault::FaultCode;
    use osci_core::message::{
        Attachment, AttachmentState, ContentContainer, EncryptedData, MessageBuilder, MessageKind, OsciMessage,
    };
    use osci_core::mime::{MultipartReader, MultipartWriter, PartHeaders, TransferEncoding};
    use osci_core::parser::{from_bytes, ParseOptions};
    use osci_core::roles::{Decrypter, LocalIdentity};
    use osci_core::signature::sign;
    use osci_core::OsciError;

    fn plain_config() -> OsciConfig {
        OsciConfig { encrypt: false, ..OsciConfig::default() }
    }

    fn client() -> LocalIdentity {
        LocalIdentity::from_seeds("client", [1; 32], [2; 32])
    }

    fn supplier() -> LocalIdentity {
        LocalIdentity::from_seeds("supplier", [3; 32], [4; 32])
    }

    fn scan_bytes() -> Vec<u8> {
        (0..3000u32).map(|i| (i % 251) as u8).collect()
    }

    fn delivery_with_attachments() -> OsciMessage {
        MessageBuilder::new(MessageKind::StoreDelivery)
            .content(
                ContentContainer::new("A")
                    .with_data("cover letter")
                    .with_attachment("scan")
                    .with_container(ContentContainer::new("B").with_attachment("notes")),
            )
            .attachment(Attachment::from_bytes("scan", "application/pdf", scan_bytes()))
            .attachment(Attachment::from_bytes("notes", "text/plain", "see page 2"))
            .build()
            .unwrap()
    }

    fn parse_with(bytes: &[u8], opts: &ParseOptions) -> osci_core::Result<OsciMessage> {
        from_bytes(bytes, opts, &DecryptContext::new())
    }

    fn parse(bytes: &[u8]) -> osci_core::Result<OsciMessage> {
        parse_with(bytes, &ParseOptions::default())
    }

    /// All parts of a multipart message as (headers, body).
    fn split_parts(bytes: &[u8]) -> Vec<(PartHeaders, Vec<u8>)> {
        let mut reader = MultipartReader::from_message(bytes).unwrap();
        let mut parts = Vec::new();
        while let Some(headers) = reader.next_part().unwrap() {
            let mut body = Vec::new();
            reader.body(headers.transfer_encoding).read_to_end(&mut body).unwrap();
            parts.push((headers, body));
        }
        parts
    }

    fn join_parts(parts: &[(PartHeaders, Vec<u8>)]) -> Vec<u8> {
        let mut writer = MultipartWriter::new(Vec::new());
        writer.write_message_headers().unwrap();
        for (headers, body) in parts {
            let mut part = writer.start_part(headers).unwrap();
            std::io::Write::write_all(&mut part, body).unwrap();
            part.finish().unwrap();
        }
        writer.finish().unwrap()
    }

    fn expect_parse_code(result: osci_core::Result<OsciMessage>, code: FaultCode) {
        match result {
            Err(e @ OsciError::Parse { .. }) => assert_eq!(e.fault_code(), code, "{}", e),
            Err(other) => panic!("expected parse error {}, got {}", code, other),
            Ok(_) => panic!("expected parse error {}", code),
        }
    }

    #[test]
    fn attachments_bind_by_content_id() {
        let mut msg = delivery_with_attachments();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &plain_config()).unwrap();

        let parsed = parse(&bytes).unwrap();
        assert!(parsed.is_signed());
        assert_eq!(parsed.attachments().len(), 2);
        let scan = parsed.attachment("scan").unwrap();
        assert_eq!(scan.state(), AttachmentState::Complete);
        assert_eq!(scan.data(), scan_bytes().as_slice());
        assert_eq!(scan.size(), 3000);
        assert_eq!(scan.content_type(), "application/pdf");
        assert_eq!(parsed.attachment("notes").unwrap().data(), b"see page 2");
        assert_eq!(parsed.content("B").unwrap().attachment_refs(), vec!["notes"]);

        let captured = parsed.captured_digests().unwrap();
        assert!(captured.get("cid:scan").is_some());
        assert!(captured.get("cid:notes").is_some());
        assert_eq!(parsed.telemetry().unwrap().attachments, 2);
    }

    #[test]
    fn base64_transfer_encoding_round_trips() {
        let cfg = OsciConfig { base64_attachments: true, ..plain_config() };
        let mut msg = delivery_with_attachments();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &cfg).unwrap();
        let parts = split_parts(&bytes);
        assert_eq!(parts[1].0.transfer_encoding, TransferEncoding::Base64);

        let parsed = parse(&bytes).unwrap();
        assert!(parsed.is_signed());
        assert_eq!(parsed.attachment("scan").unwrap().data(), scan_bytes().as_slice());
    }

    #[test]
    fn unknown_part_is_unmatched() {
        let mut msg = delivery_with_attachments();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &plain_config()).unwrap();
        let mut parts = split_parts(&bytes);
        parts[1].0.content_id = Some("stranger".into());
        expect_parse_code(parse(&join_parts(&parts)), FaultCode::AttachmentUnmatched);
    }

    #[test]
    fn part_without_content_id_is_unmatched() {
        let mut msg = delivery_with_attachments();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &plain_config()).unwrap();
        let mut parts = split_parts(&bytes);
        parts[2].0.content_id = None;
        expect_parse_code(parse(&join_parts(&parts)), FaultCode::AttachmentUnmatched);
    }

    #[test]
    fn repeated_part_is_unmatched() {
        let mut msg = delivery_with_attachments();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &plain_config()).unwrap();
        let mut parts = split_parts(&bytes);
        let again = parts[1].clone();
        parts.push(again);
        expect_parse_code(parse(&join_parts(&parts)), FaultCode::AttachmentUnmatched);
    }

    #[test]
    fn declared_but_absent_part_is_missing() {
        let mut msg = delivery_with_attachments();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &plain_config()).unwrap();
        let mut parts = split_parts(&bytes);
        parts.remove(2);
        expect_parse_code(parse(&join_parts(&parts)), FaultCode::AttachmentMissing);
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let mut msg = delivery_with_attachments();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &plain_config()).unwrap();
        let mut parts = split_parts(&bytes);
        parts.swap(1, 2);
        let parsed = parse(&join_parts(&parts)).unwrap();
        assert!(parsed.is_signed());
        assert_eq!(parsed.attachment("notes").unwrap().data(), b"see page 2");
    }

    #[test]
    fn retention_cap_truncates_but_digest_covers_everything() {
        let mut msg = delivery_with_attachments();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &plain_config()).unwrap();
        let opts = ParseOptions { attachment_retention: Some(100), ..ParseOptions::default() };
        let parsed = parse_with(&bytes, &opts).unwrap();

        assert!(parsed.is_signed());
        let scan = parsed.attachment("scan").unwrap();
        assert!(scan.is_truncated());
        assert_eq!(scan.data(), &scan_bytes()[..100]);
        assert_eq!(scan.size(), 3000);
        assert!(!scan.is_rereadable());

        let notes = parsed.attachment("notes").unwrap();
        assert!(!notes.is_truncated());
        assert!(notes.is_rereadable());
    }

    #[test]
    fn single_pass_reader_cannot_be_signed() {
        let reader = Box::new(Cursor::new(b"streamed once".to_vec()));
        let mut msg = MessageBuilder::new(MessageKind::StoreDelivery)
            .content(ContentContainer::new("A").with_attachment("live"))
            .attachment(Attachment::from_reader("live", "text/plain", reader))
            .build()
            .unwrap();
        assert!(!msg.attachment("live").unwrap().is_rereadable());
        compose(&mut msg).unwrap();
        assert!(matches!(sign(&mut msg, &client(), &plain_config()), Err(OsciError::Precondition(_))));

        // Unsigned it streams fine.
        let bytes = to_bytes(&mut msg, &plain_config()).unwrap();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.attachment("live").unwrap().data(), b"streamed once");
    }

    #[test]
    fn file_attachment_is_read_per_pass() {
        let path = std::env::temp_dir().join(format!("osci-attachment-{}.bin", std::process::id()));
        std::fs::write(&path, scan_bytes()).unwrap();
        let mut msg = MessageBuilder::new(MessageKind::StoreDelivery)
            .content(ContentContainer::new("A").with_attachment("disk"))
            .attachment(Attachment::from_file("disk", "application/octet-stream", &path))
            .build()
            .unwrap();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &plain_config()).unwrap();
        std::fs::remove_file(&path).unwrap();

        let parsed = parse(&bytes).unwrap();
        assert!(parsed.is_signed());
        assert_eq!(parsed.attachment("disk").unwrap().data(), scan_bytes().as_slice());
    }

    #[test]
    fn compose_checks_attachment_references() {
        let mut orphan = MessageBuilder::new(MessageKind::StoreDelivery)
            .content(ContentContainer::new("A").with_data("x"))
            .attachment(Attachment::from_bytes("loose", "text/plain", "unused"))
            .build()
            .unwrap();
        assert!(matches!(compose(&mut orphan), Err(OsciError::Precondition(_))));

        let mut dangling = MessageBuilder::new(MessageKind::StoreDelivery)
            .content(ContentContainer::new("A").with_attachment("nowhere"))
            .build()
            .unwrap();
        assert!(matches!(compose(&mut dangling), Err(OsciError::Precondition(_))));
    }

    #[test]
    fn builder_rejects_misplaced_content() {
        let wrong_kind = MessageBuilder::new(MessageKind::InitDialog)
            .content(ContentContainer::new("A").with_data("x"))
            .build();
        assert!(matches!(wrong_kind, Err(OsciError::Precondition(_))));

        let twice = MessageBuilder::new(MessageKind::StoreDelivery)
            .content(ContentContainer::new("A").with_attachment("a"))
            .attachment(Attachment::from_bytes("a", "text/plain", "1"))
            .attachment(Attachment::from_bytes("a", "text/plain", "2"))
            .build();
        assert!(matches!(twice, Err(OsciError::Precondition(_))));
    }

    #[test]
    fn sealed_content_opens_for_its_reader_only() {
        let cfg = plain_config();
        let reader = supplier();
        let container = ContentContainer::new("secret").with_data("for supplier eyes").with_attachment("doc");
        let mut attachments = vec![Attachment::from_bytes("doc", "application/pdf", scan_bytes())];
        let sealed = EncryptedData::seal(&container, &mut attachments, &[reader.cipher_certificate()], &cfg)
            .unwrap()
            .with_id("enc1");
        assert!(attachments[0].is_encrypted());

        let mut builder = MessageBuilder::new(MessageKind::StoreDelivery)
            .content(ContentContainer::new("public").with_data("cover"))
            .encrypted(sealed);
        for att in attachments {
            builder = builder.attachment(att);
        }
        let mut msg = builder.build().unwrap();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &cfg).unwrap();

        // Sealed bytes never appear in the clear.
        let text = String::from_utf8_lossy(&bytes);
        assert!(!text.contains("Zm9yIHN1cHBsaWVyIGV5ZXM="));
        assert!(!bytes.windows(64).any(|w| w == &scan_bytes()[..64]));

        let parsed = parse(&bytes).unwrap();
        assert!(parsed.is_signed());
        assert!(parsed.content("secret").is_none());
        assert_eq!(parsed.encrypted().len(), 1);
        assert_eq!(parsed.encrypted()[0].id.as_deref(), Some("enc1"));
        assert_eq!(parsed.encrypted()[0].attachment_refs, vec!["doc".to_string()]);

        let opened = parsed.open_encrypted(&reader).unwrap();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].container.data()[0].as_ref(), b"for supplier eyes");
        assert_eq!(opened[0].attachments.len(), 1);
        assert_eq!(opened[0].attachments[0].data(), scan_bytes().as_slice());

        // Entries addressed to someone else are skipped.
        assert!(parsed.open_encrypted(&client()).unwrap().is_empty());
        match parsed.encrypted()[0].open(&client(), parsed.attachments()) {
            Err(e) => assert_eq!(e.fault_code(), FaultCode::NoMatchingPrivateKey),
            Ok(_) => panic!("opened with the wrong key"),
        }
    }

    #[test]
    fn truncated_sealed_attachment_cannot_be_opened() {
        let cfg = plain_config();
        let reader = supplier();
        let container = ContentContainer::new("secret").with_attachment("doc");
        let mut attachments = vec![Attachment::from_bytes("doc", "application/pdf", scan_bytes())];
        let sealed = EncryptedData::seal(&container, &mut attachments, &[reader.cipher_certificate()], &cfg).unwrap();
        let mut msg = MessageBuilder::new(MessageKind::StoreDelivery)
            .encrypted(sealed)
            .attachment(attachments.remove(0))
            .build()
            .unwrap();
        let bytes = write_message(&mut msg, Some(&client()), None, Vec::new(), &cfg).unwrap();

        let opts = ParseOptions { attachment_retention: Some(64), ..ParseOptions::default() };
        let parsed = parse_with(&bytes, &opts).unwrap();
        assert!(parsed.is_signed());
        assert!(matches!(parsed.open_encrypted(&reader), Err(OsciError::Precondition(_))));
    }
}
