// ## 📂 File: `src/envelope/stream.rs`

//! Streaming symmetric cipher used for ciphertext MIME parts and encrypted
//! content.
//!
//! Layout:
//!
//! ```text
//! [ iv (12 | 16) ]
//! [ frame_type (1) ][ plaintext_len (4) ][ ciphertext_len (4) ][ ciphertext + tag ]
//! ...
//! [ terminator frame: plaintext_len = 0, ciphertext = tag only ]
//! ```
//!
//! - All integers little-endian.
//! - Frame nonce = IV with the frame index XORed into its last 8 bytes.
//! - AAD = frame_type || frame_index (u64 LE), so frames cannot be reordered,
//!   retyped, or dropped; a missing terminator is reported as truncation.
//! - Plaintext of a frame is released only after its tag verified.

use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use num_enum::TryFromPrimitive;
use zeroize::Zeroizing;

use crate::constants::MAX_CHUNK_SIZE;
use crate::crypto::types::{CryptoError, TAG_LEN};
use crate::crypto::{derive_frame_nonce, validate_iv, AeadImpl, SymmetricCipher};
use crate::telemetry::TelemetryCounters;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum FrameType {
    Data       = 0x01,
    Terminator = 0x02,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    pub plaintext_len: u32,
    pub ciphertext_len: u32,
}

impl FrameHeader {
    pub const LEN: usize = 1  // frame_type
        + 4                  // plaintext_len
        + 4;                 // ciphertext_len

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0] = self.frame_type as u8;
        LittleEndian::write_u32(&mut out[1..5], self.plaintext_len);
        LittleEndian::write_u32(&mut out[5..9], self.ciphertext_len);
        out
    }

    /// Parse and validate a frame header.
    pub fn parse(wire: &[u8; Self::LEN]) -> Result<Self, CryptoError> {
        let frame_type = FrameType::try_from(wire[0])
            .map_err(|_| CryptoError::Failure(format!("invalid frame type: {}", wire[0])))?;
        let header = Self {
            frame_type,
            plaintext_len: LittleEndian::read_u32(&wire[1..5]),
            ciphertext_len: LittleEndian::read_u32(&wire[5..9]),
        };
        header.validate()?;
        Ok(header)
    }

    pub fn validate(&self) -> Result<(), CryptoError> {
        let pt = self.plaintext_len as usize;
        match self.frame_type {
            FrameType::Data if pt == 0 || pt > MAX_CHUNK_SIZE => {
                return Err(CryptoError::Failure(format!("data frame length {} out of range", pt)));
            }
            FrameType::Terminator if pt != 0 => {
                return Err(CryptoError::Failure("terminator frame carries plaintext".into()));
            }
            _ => {}
        }
        if self.ciphertext_len as usize != pt + TAG_LEN {
            return Err(CryptoError::Failure(format!(
                "ciphertext length mismatch: expected {}, got {}",
                pt + TAG_LEN,
                self.ciphertext_len
            )));
        }
        Ok(())
    }
}

#[inline]
fn frame_aad(frame_type: FrameType, frame_index: u64) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[0] = frame_type as u8;
    LittleEndian::write_u64(&mut aad[1..], frame_index);
    aad
}

fn crypto_io(e: CryptoError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Enciphers everything written to it into `inner`.
pub struct EncryptingWriter<W: Write> {
    inner: W,
    aead: AeadImpl,
    iv: Vec<u8>,
    chunk_size: usize,
    buf: Vec<u8>,
    frame_index: u64,
    iv_written: bool,
    counters: TelemetryCounters,
}

impl<W: Write> EncryptingWriter<W> {
    pub fn new(
        inner: W,
        cipher: SymmetricCipher,
        key: &[u8],
        iv: Vec<u8>,
        chunk_size: usize,
    ) -> Result<Self, CryptoError> {
        validate_iv(&iv)?;
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(CryptoError::Failure(format!("chunk size {} out of range", chunk_size)));
        }
        let aead = AeadImpl::new(cipher, key, iv.len())?;
        Ok(Self {
            inner,
            aead,
            iv,
            chunk_size,
            buf: Vec::with_capacity(chunk_size),
            frame_index: 0,
            iv_written: false,
            counters: TelemetryCounters::default(),
        })
    }

    fn write_iv(&mut self) -> io::Result<()> {
        if !self.iv_written {
            self.inner.write_all(&self.iv)?;
            self.iv_written = true;
        }
        Ok(())
    }

    fn seal_frame(&mut self, frame_type: FrameType, len: usize) -> io::Result<()> {
        self.write_iv()?;
        let nonce = derive_frame_nonce(&self.iv, self.frame_index).map_err(crypto_io)?;
        let aad = frame_aad(frame_type, self.frame_index);
        let ct = self.aead.seal(&nonce, &aad, &self.buf[..len]).map_err(crypto_io)?;

        let header = FrameHeader {
            frame_type,
            plaintext_len: len as u32,
            ciphertext_len: ct.len() as u32,
        };
        self.inner.write_all(&header.encode())?;
        self.inner.write_all(&ct)?;

        match frame_type {
            FrameType::Data => self.counters.add_frame(len, ct.len()),
            FrameType::Terminator => self.counters.add_terminator(ct.len()),
        }
        self.buf.drain(..len);
        self.frame_index += 1;
        Ok(())
    }

    /// Seal buffered plaintext and the terminator frame.
    pub fn finish(mut self) -> io::Result<(W, TelemetryCounters)> {
        while !self.buf.is_empty() {
            let len = self.buf.len().min(self.chunk_size);
            self.seal_frame(FrameType::Data, len)?;
        }
        self.seal_frame(FrameType::Terminator, 0)?;
        self.inner.flush()?;
        Ok((self.inner, self.counters))
    }
}

impl<W: Write> Write for EncryptingWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        while self.buf.len() >= self.chunk_size {
            let len = self.chunk_size;
            self.seal_frame(FrameType::Data, len)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Deciphers a framed stream from `inner`.
pub struct DecryptingReader<R: Read> {
    inner: R,
    cipher: SymmetricCipher,
    key: Zeroizing<Vec<u8>>,
    iv_len: usize,
    state: Option<(AeadImpl, Vec<u8>)>,
    frame_index: u64,
    out: Vec<u8>,
    pos: usize,
    done: bool,
    counters: TelemetryCounters,
}

impl<R: Read> DecryptingReader<R> {
    pub fn new(inner: R, cipher: SymmetricCipher, key: &[u8], iv_len: usize) -> Result<Self, CryptoError> {
        AeadImpl::new(cipher, key, iv_len)?;
        Ok(Self {
            inner,
            cipher,
            key: Zeroizing::new(key.to_vec()),
            iv_len,
            state: None,
            frame_index: 0,
            out: Vec::new(),
            pos: 0,
            done: false,
            counters: TelemetryCounters::default(),
        })
    }

    pub fn counters(&self) -> &TelemetryCounters {
        &self.counters
    }

    /// True once the terminator frame verified.
    pub fn is_complete(&self) -> bool {
        self.done
    }

    fn read_exact_or_truncated(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                crypto_io(CryptoError::Truncated)
            } else {
                e
            }
        })
    }

    fn next_frame(&mut self) -> io::Result<()> {
        if self.state.is_none() {
            let mut iv = vec![0u8; self.iv_len];
            self.read_exact_or_truncated(&mut iv)?;
            validate_iv(&iv).map_err(crypto_io)?;
            let aead = AeadImpl::new(self.cipher, &self.key, self.iv_len).map_err(crypto_io)?;
            self.state = Some((aead, iv));
        }

        let mut raw = [0u8; FrameHeader::LEN];
        self.read_exact_or_truncated(&mut raw)?;
        let header = FrameHeader::parse(&raw).map_err(crypto_io)?;

        let mut ct = vec![0u8; header.ciphertext_len as usize];
        self.read_exact_or_truncated(&mut ct)?;

        let (aead, iv) = match &self.state {
            Some(s) => s,
            None => return Err(crypto_io(CryptoError::Failure("stream IV missing".into()))),
        };
        let nonce = derive_frame_nonce(iv, self.frame_index).map_err(crypto_io)?;
        let aad = frame_aad(header.frame_type, self.frame_index);
        let pt = aead.open(&nonce, &aad, &ct).map_err(crypto_io)?;
        self.frame_index += 1;

        match header.frame_type {
            FrameType::Data => {
                self.counters.add_frame(pt.len(), ct.len());
                self.out = pt;
                self.pos = 0;
            }
            FrameType::Terminator => {
                self.counters.add_terminator(ct.len());
                self.done = true;
                let mut trailing = [0u8; 1];
                if self.inner.read(&mut trailing)? != 0 {
                    return Err(crypto_io(CryptoError::Failure("data after terminator frame".into())));
                }
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.out.len() {
            if self.done {
                return Ok(0);
            }
            self.out.clear();
            self.pos = 0;
            self.next_frame()?;
        }
        let n = (self.out.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.out[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// One-shot encryption into memory.
pub fn encrypt_to_vec(
    cipher: SymmetricCipher,
    key: &[u8],
    iv: Vec<u8>,
    chunk_size: usize,
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let mut w = EncryptingWriter::new(Vec::with_capacity(plaintext.len() + 64), cipher, key, iv, chunk_size)?;
    let io_err = |e: io::Error| CryptoError::Failure(e.to_string());
    w.write_all(plaintext).map_err(io_err)?;
    let (out, _) = w.finish().map_err(io_err)?;
    Ok(out)
}

/// One-shot decryption from memory.
pub fn decrypt_to_vec(
    cipher: SymmetricCipher,
    key: &[u8],
    iv_len: usize,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let mut r = DecryptingReader::new(ciphertext, cipher, key, iv_len)?;
    let mut out = Vec::with_capacity(ciphertext.len());
    r.read_to_end(&mut out).map_err(unwrap_crypto)?;
    Ok(out)
}

/// Recover the `CryptoError` carried inside an I/O error from this module.
pub fn unwrap_crypto(e: io::Error) -> CryptoError {
    let detail = e.to_string();
    match e.into_inner().map(|inner| inner.downcast::<CryptoError>()) {
        Some(Ok(crypto)) => *crypto,
        _ => CryptoError::Failure(detail),
    }
}

