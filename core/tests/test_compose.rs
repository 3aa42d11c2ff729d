#[cfg(test)]
mod tests {
    use osci_core::compose::{compose, write_message};
    use osci_core::config::OsciConfig;
    use osci_core::message::{Attachment, ContentContainer, CustomHeader, MessageBuilder, MessageKind, OsciMessage};
    use osci_core::OsciError;

    fn plain_config() -> OsciConfig {
        OsciConfig { encrypt: false, ..OsciConfig::default() }
    }

    fn header(id: &str) -> CustomHeader {
        CustomHeader::new(&format!(r#"<x:Tag xmlns:x="urn:example:tag" Id="{}">t</x:Tag>"#, id)).unwrap()
    }

    fn delivery_with(headers: &[&str]) -> OsciMessage {
        let mut builder = MessageBuilder::new(MessageKind::StoreDelivery)
            .content(ContentContainer::new("A").with_data("hello"));
        for id in headers {
            builder = builder.custom_header(header(id));
        }
        builder.build().unwrap()
    }

    fn assert_precondition(msg: &mut OsciMessage) {
        match compose(msg) {
            Err(OsciError::Precondition(_)) => {}
            Err(other) => panic!("expected a precondition error, got {}", other),
            Ok(()) => panic!("message composed"),
        }
    }

    #[test]
    fn distinct_custom_headers_compose() {
        let mut msg = delivery_with(&["h1", "h2"]);
        compose(&mut msg).unwrap();
    }

    #[test]
    fn repeated_custom_header_id_is_refused() {
        assert_precondition(&mut delivery_with(&["h1", "h1"]));
    }

    #[test]
    fn custom_header_cannot_take_a_reserved_id() {
        for id in ["body", "controlblock", "featuredescription", "clientsignature", "storedelivery"] {
            assert_precondition(&mut delivery_with(&[id]));
        }
    }

    #[test]
    fn reserved_id_refused_by_write_message_too() {
        let mut msg = delivery_with(&["body"]);
        let result = write_message(&mut msg, None, None, Vec::new(), &plain_config());
        assert!(matches!(result, Err(OsciError::Precondition(_))));
    }

    #[test]
    fn attachment_added_after_build_twice_is_refused() {
        let mut msg = MessageBuilder::new(MessageKind::StoreDelivery)
            .content(ContentContainer::new("A").with_attachment("att1"))
            .attachment(Attachment::from_bytes("att1", "text/plain", "first"))
            .build()
            .unwrap();
        msg.add_attachment(Attachment::from_bytes("att1", "text/plain", "second"));
        assert_precondition(&mut msg);
    }

    #[test]
    fn attachment_ref_id_cannot_break_mime_headers() {
        for ref_id in ["att1\r\nX-Evil: 1", "att<1>", ""] {
            let mut msg = MessageBuilder::new(MessageKind::StoreDelivery)
                .content(ContentContainer::new("A").with_attachment(ref_id))
                .attachment(Attachment::from_bytes(ref_id, "text/plain", "x"))
                .build()
                .unwrap();
            assert_precondition(&mut msg);
        }
    }

    #[test]
    fn attachment_content_type_must_stay_on_one_line() {
        let mut msg = MessageBuilder::new(MessageKind::StoreDelivery)
            .content(ContentContainer::new("A").with_attachment("att1"))
            .attachment(Attachment::from_bytes("att1", "text/plain\r\nX-Evil: 1", "x"))
            .build()
            .unwrap();
        assert_precondition(&mut msg);
    }
}
