#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use proptest::prelude::*;
    use osci_core::mime::{header_param, MimeError, MultipartReader, MultipartWriter, PartHeaders, TransferEncoding};

    fn write_parts(boundary: Option<&str>, parts: &[(PartHeaders, Vec<u8>)]) -> Vec<u8> {
        let mut writer = match boundary {
            Some(b) => MultipartWriter::with_boundary(Vec::new(), b.to_string()),
            None => MultipartWriter::new(Vec::new()),
        };
        writer.write_message_headers().unwrap();
        for (headers, body) in parts {
            let mut part = writer.start_part(headers).unwrap();
            part.write_all(body).unwrap();
            assert_eq!(part.finish().unwrap(), body.len() as u64);
        }
        writer.finish().unwrap()
    }

    fn read_parts(raw: &[u8]) -> Vec<(PartHeaders, Vec<u8>)> {
        let mut reader = MultipartReader::from_message(raw).unwrap();
        let mut out = Vec::new();
        while let Some(headers) = reader.next_part().unwrap() {
            let mut body = Vec::new();
            reader.body(headers.transfer_encoding).read_to_end(&mut body).unwrap();
            out.push((headers, body));
        }
        assert!(reader.is_closed());
        out
    }

    #[test]
    fn parts_round_trip_with_their_headers() {
        let blob: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 256) as u8).collect();
        let mut tagged = PartHeaders::new("text/plain", "note", TransferEncoding::EightBit);
        tagged.extra.push(("Content-Description".into(), "memo".into()));
        let parts = vec![
            (PartHeaders::new("text/xml; charset=UTF-8", "osci@message", TransferEncoding::Binary), b"<a/>".to_vec()),
            (PartHeaders::new("application/pdf", "scan", TransferEncoding::Base64), blob),
            (tagged, "grüße".as_bytes().to_vec()),
        ];
        let raw = write_parts(None, &parts);
        assert_eq!(read_parts(&raw), parts);
    }

    #[test]
    fn base64_lines_stay_short() {
        let parts = vec![(PartHeaders::new("application/octet-stream", "x", TransferEncoding::Base64), vec![0xFF; 600])];
        let raw = write_parts(Some("bnd"), &parts);
        let text = String::from_utf8(raw.clone()).unwrap();
        let body_start = text.find("Content-ID: <x>\r\n\r\n").unwrap() + "Content-ID: <x>\r\n\r\n".len();
        let body_end = text.rfind("\r\n--bnd--").unwrap();
        assert!(text[body_start..body_end].split("\r\n").all(|l| l.len() <= 76));
        assert_eq!(read_parts(&raw), parts);
    }

    #[test]
    fn near_delimiters_inside_a_body_are_data() {
        let body = b"line\r\n--bn not it\r\n-- bnd\n--bnd\r\n-bnd\r\n--".to_vec();
        let parts = vec![(PartHeaders::new("text/plain", "t", TransferEncoding::Binary), body)];
        let raw = write_parts(Some("bnd"), &parts);
        assert_eq!(read_parts(&raw)[0].1, parts[0].1);
    }

    #[test]
    fn preamble_and_folded_headers_are_handled() {
        let raw = b"MIME-Version: 1.0\r\n\
Content-Type: multipart/related;\r\n boundary=\"xyz\"\r\n\r\n\
This is a preamble.\r\n\
--xyz\r\n\
Content-Type: text/plain;\r\n\tcharset=us-ascii\r\n\
Content-ID: <a>\r\n\r\n\
hello\r\n\
--xyz--\r\n";
        let parts = read_parts(raw);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].0.content_type, "text/plain; charset=us-ascii");
        assert_eq!(parts[0].0.content_id.as_deref(), Some("a"));
        assert_eq!(parts[0].1, b"hello");
    }

    #[test]
    fn unread_part_is_drained_before_the_next() {
        let parts = vec![
            (PartHeaders::new("text/plain", "a", TransferEncoding::Binary), vec![b'a'; 20_000]),
            (PartHeaders::new("text/plain", "b", TransferEncoding::Binary), b"second".to_vec()),
        ];
        let raw = write_parts(None, &parts);
        let mut reader = MultipartReader::from_message(raw.as_slice()).unwrap();
        assert_eq!(reader.next_part().unwrap().unwrap().content_id.as_deref(), Some("a"));
        let second = reader.next_part().unwrap().unwrap();
        assert_eq!(second.content_id.as_deref(), Some("b"));
        let mut body = String::new();
        reader.body(second.transfer_encoding).read_to_string(&mut body).unwrap();
        assert_eq!(body, "second");
        assert!(reader.next_part().unwrap().is_none());
    }

    #[test]
    fn missing_close_delimiter_is_an_unexpected_eof() {
        let raw = b"Content-Type: multipart/related; boundary=q\r\n\r\n--q\r\nContent-ID: <a>\r\n\r\nno end";
        let mut reader = MultipartReader::from_message(&raw[..]).unwrap();
        reader.next_part().unwrap().unwrap();
        let err = reader.body(TransferEncoding::Binary).read_to_end(&mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn header_errors() {
        let no_boundary = b"Content-Type: multipart/related\r\n\r\n--q\r\n";
        assert!(matches!(MultipartReader::from_message(&no_boundary[..]), Err(MimeError::MissingBoundary)));

        let bad_encoding = b"Content-Type: multipart/related; boundary=q\r\n\r\n--q\r\nContent-Transfer-Encoding: uuencode\r\n\r\nx\r\n--q--\r\n";
        let mut reader = MultipartReader::from_message(&bad_encoding[..]).unwrap();
        assert!(matches!(reader.next_part(), Err(MimeError::MalformedHeader(_))));

        assert_eq!(TransferEncoding::parse(" 7bit ").unwrap(), TransferEncoding::Binary);
        assert_eq!(TransferEncoding::parse("BASE64").unwrap(), TransferEncoding::Base64);
    }

    #[test]
    fn header_values_cannot_span_lines() {
        let split_id = PartHeaders::new("text/plain", "a\r\nX-Evil: 1", TransferEncoding::Binary);
        assert!(matches!(split_id.validate(), Err(MimeError::MalformedHeader(_))));
        let mut writer = MultipartWriter::new(Vec::new());
        writer.write_message_headers().unwrap();
        let err = writer.start_part(&split_id).err().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);

        let split_type = PartHeaders::new("text/plain\nX-Evil: 1", "a", TransferEncoding::Binary);
        assert!(split_type.validate().is_err());

        let mut bad_name = PartHeaders::new("text/plain", "a", TransferEncoding::Binary);
        bad_name.extra.push(("X-Evil: 1\r\nX-Tag".into(), "v".into()));
        assert!(matches!(bad_name.validate(), Err(MimeError::MalformedHeader(_))));

        let mut bad_value = PartHeaders::new("text/plain", "a", TransferEncoding::Binary);
        bad_value.extra.push(("Content-Description".into(), "memo\r\n".into()));
        assert!(bad_value.validate().is_err());

        let mut fine = PartHeaders::new("text/plain; charset=UTF-8", "a", TransferEncoding::Binary);
        fine.extra.push(("Content-Description".into(), "memo, page 2".into()));
        assert!(fine.validate().is_ok());
    }

    #[test]
    fn header_parameters() {
        let v = r#"Multipart/Related; boundary="MIME_boundary_1"; type="text/xml"; start="<osci@message>""#;
        assert_eq!(header_param(v, "boundary").as_deref(), Some("MIME_boundary_1"));
        assert_eq!(header_param(v, "START").as_deref(), Some("<osci@message>"));
        assert_eq!(header_param(v, "charset"), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_bodies_round_trip(
            bodies in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..3000), 1..4),
            base64 in any::<bool>(),
        ) {
            let enc = if base64 { TransferEncoding::Base64 } else { TransferEncoding::Binary };
            let parts: Vec<_> = bodies
                .into_iter()
                .enumerate()
                .map(|(i, b)| (PartHeaders::new("application/octet-stream", format!("p{}", i), enc), b))
                .collect();
            let raw = write_parts(None, &parts);
            prop_assert_eq!(read_parts(&raw), parts);
        }
    }
}
