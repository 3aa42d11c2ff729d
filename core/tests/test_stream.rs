#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use proptest::prelude::*;
    use osci_core::crypto::{derive_frame_nonce, generate_content_key, random_iv, validate_iv, CryptoError, SymmetricCipher};
    use osci_core::envelope::stream::{unwrap_crypto, FrameHeader, FrameType};
    use osci_core::envelope::{decrypt_to_vec, encrypt_to_vec, DecryptingReader, EncryptingWriter};

    const KEY: [u8; 32] = [0x42; 32];

    fn iv(len: usize) -> Vec<u8> {
        (1..=len as u8).collect()
    }

    #[test]
    fn empty_plaintext_is_just_a_terminator() {
        let ct = encrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, iv(12), 1024, b"").unwrap();
        // iv + header + tag
        assert_eq!(ct.len(), 12 + FrameHeader::LEN + 16);
        let pt = decrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, 12, &ct).unwrap();
        assert!(pt.is_empty());
    }

    #[test]
    fn legacy_sixteen_byte_iv_decrypts() {
        let ct = encrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, iv(16), 7, b"legacy peers use 16 byte IVs").unwrap();
        let pt = decrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, 16, &ct).unwrap();
        assert_eq!(pt, b"legacy peers use 16 byte IVs");

        // Reading it with the wrong IV length shifts every frame.
        assert!(decrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, 12, &ct).is_err());
    }

    #[test]
    fn aes128_round_trip() {
        let key = generate_content_key(SymmetricCipher::Aes128Gcm);
        assert_eq!(key.len(), 16);
        let ct = encrypt_to_vec(SymmetricCipher::Aes128Gcm, &key, random_iv(12).unwrap(), 5, b"short key").unwrap();
        let pt = decrypt_to_vec(SymmetricCipher::Aes128Gcm, &key, 12, &ct).unwrap();
        assert_eq!(pt, b"short key");
    }

    #[test]
    fn truncated_stream_is_reported() {
        let ct = encrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, iv(12), 4, b"0123456789abcdef").unwrap();
        // Drop the terminator frame.
        let cut = ct.len() - (FrameHeader::LEN + 16);
        match decrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, 12, &ct[..cut]) {
            Err(CryptoError::Truncated) => {}
            other => panic!("expected truncation, got {:?}", other),
        }
        // Cut in the middle of a frame.
        match decrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, 12, &ct[..20]) {
            Err(CryptoError::Truncated) => {}
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn data_after_terminator_is_rejected() {
        let mut ct = encrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, iv(12), 64, b"payload").unwrap();
        ct.push(0);
        assert!(matches!(
            decrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, 12, &ct),
            Err(CryptoError::Failure(_))
        ));
    }

    #[test]
    fn wrong_key_fails_closed() {
        let ct = encrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, iv(12), 64, b"secret").unwrap();
        let other = [0x43; 32];
        let mut reader = DecryptingReader::new(ct.as_slice(), SymmetricCipher::Aes256Gcm, &other, 12).unwrap();
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert!(matches!(unwrap_crypto(err), CryptoError::TagMismatch));
        assert!(out.is_empty());
        assert!(!reader.is_complete());
    }

    #[test]
    fn swapped_frames_are_rejected() {
        let ct = encrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, iv(12), 4, b"aaaabbbb").unwrap();
        let frame = FrameHeader::LEN + 4 + 16;
        let (head, rest) = ct.split_at(12);
        let mut swapped = head.to_vec();
        swapped.extend_from_slice(&rest[frame..2 * frame]);
        swapped.extend_from_slice(&rest[..frame]);
        swapped.extend_from_slice(&rest[2 * frame..]);
        assert!(decrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, 12, &swapped).is_err());
    }

    #[test]
    fn iv_validation() {
        assert!(validate_iv(&iv(12)).is_ok());
        assert!(validate_iv(&iv(16)).is_ok());
        assert!(matches!(validate_iv(&iv(8)), Err(CryptoError::InvalidNonceLen { actual: 8, .. })));
        assert!(validate_iv(&[0u8; 12]).is_err());
        assert!(random_iv(24).is_err());
        assert!(EncryptingWriter::new(Vec::new(), SymmetricCipher::Aes256Gcm, &KEY, vec![0u8; 12], 16).is_err());
    }

    #[test]
    fn frame_nonces_differ_per_index() {
        let base = iv(12);
        let n0 = derive_frame_nonce(&base, 0).unwrap();
        let n1 = derive_frame_nonce(&base, 1).unwrap();
        assert_eq!(n0, base);
        assert_ne!(n0, n1);
        assert_eq!(n0[..4], n1[..4]);
    }

    #[test]
    fn frame_header_validation() {
        let ok = FrameHeader { frame_type: FrameType::Data, plaintext_len: 10, ciphertext_len: 26 };
        assert_eq!(FrameHeader::parse(&ok.encode()).unwrap(), ok);

        let bad_len = FrameHeader { frame_type: FrameType::Data, plaintext_len: 10, ciphertext_len: 10 };
        assert!(FrameHeader::parse(&bad_len.encode()).is_err());

        let empty_data = FrameHeader { frame_type: FrameType::Data, plaintext_len: 0, ciphertext_len: 16 };
        assert!(empty_data.validate().is_err());

        let mut raw = ok.encode();
        raw[0] = 0x09;
        assert!(FrameHeader::parse(&raw).is_err());
    }

    #[test]
    fn writer_counters_track_frames() {
        let mut w = EncryptingWriter::new(Vec::new(), SymmetricCipher::Aes256Gcm, &KEY, iv(12), 10).unwrap();
        w.write_all(&[7u8; 25]).unwrap();
        let (out, counters) = w.finish().unwrap();
        assert_eq!(counters.frames_data, 3);
        assert_eq!(counters.frames_terminator, 1);
        assert_eq!(counters.bytes_plaintext, 25);
        assert_eq!(counters.bytes_ciphertext, 25 + 4 * 16);
        assert_eq!(out.len(), 12 + 4 * FrameHeader::LEN + 25 + 4 * 16);

        let mut r = DecryptingReader::new(out.as_slice(), SymmetricCipher::Aes256Gcm, &KEY, 12).unwrap();
        let mut pt = Vec::new();
        r.read_to_end(&mut pt).unwrap();
        assert!(r.is_complete());
        assert_eq!(r.counters(), &counters);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_round_trip_any_chunking(
            data in proptest::collection::vec(any::<u8>(), 0..4096),
            chunk in 1usize..700,
            legacy in any::<bool>(),
        ) {
            let iv_len = if legacy { 16 } else { 12 };
            let ct = encrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, random_iv(iv_len).unwrap(), chunk, &data).unwrap();
            let pt = decrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, iv_len, &ct).unwrap();
            prop_assert_eq!(pt, data);
        }

        #[test]
        fn prop_bit_flip_never_yields_plaintext(
            data in proptest::collection::vec(any::<u8>(), 1..512),
            pos in any::<proptest::sample::Index>(),
            mask in 1u8..=255,
        ) {
            let mut ct = encrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, iv(12), 64, &data).unwrap();
            let i = pos.index(ct.len());
            ct[i] ^= mask;
            prop_assert!(decrypt_to_vec(SymmetricCipher::Aes256Gcm, &KEY, 12, &ct).is_err());
        }
    }
}
