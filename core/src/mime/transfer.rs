//! Streaming base64 transfer encoding with 76-column lines.

use std::io::{self, Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::constants::BASE64_LINE_LEN;

/// Input bytes per output line.
const LINE_INPUT: usize = BASE64_LINE_LEN / 4 * 3;

pub struct Base64LineWriter<W: Write> {
    inner: W,
    pending: Vec<u8>,
}

impl<W: Write> Base64LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, pending: Vec::with_capacity(LINE_INPUT) }
    }

    fn emit_line(&mut self, chunk_len: usize) -> io::Result<()> {
        let line = STANDARD.encode(&self.pending[..chunk_len]);
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\r\n")?;
        self.pending.drain(..chunk_len);
        Ok(())
    }

    /// Flush the final partial line (with padding) and return the sink.
    pub fn finish(mut self) -> io::Result<W> {
        if !self.pending.is_empty() {
            let n = self.pending.len();
            self.emit_line(n)?;
        }
        Ok(self.inner)
    }
}

impl<W: Write> Write for Base64LineWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while self.pending.len() >= LINE_INPUT {
            self.emit_line(LINE_INPUT)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decodes base64 text, ignoring line breaks and other whitespace.
pub struct Base64Decoder<R: Read> {
    inner: R,
    pending: Vec<u8>,
    decoded: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<R: Read> Base64Decoder<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pending: Vec::new(), decoded: Vec::new(), pos: 0, eof: false }
    }

    fn refill(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; 4096];
        let n = loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        if n == 0 {
            self.eof = true;
        } else {
            self.pending.extend(chunk[..n].iter().copied().filter(|b| !b.is_ascii_whitespace()));
        }

        let usable = if self.eof { self.pending.len() } else { self.pending.len() - self.pending.len() % 4 };
        if usable == 0 {
            return Ok(());
        }
        self.decoded = STANDARD
            .decode(&self.pending[..usable])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("base64: {}", e)))?;
        self.pos = 0;
        self.pending.drain(..usable);
        Ok(())
    }
}

impl<R: Read> Read for Base64Decoder<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.decoded.len() {
            if self.eof {
                return Ok(0);
            }
            self.decoded.clear();
            self.pos = 0;
            self.refill()?;
        }
        let n = (self.decoded.len() - self.pos).min(out.len());
        out[..n].copy_from_slice(&self.decoded[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
