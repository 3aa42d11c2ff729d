//! Streaming multipart/related reader.
//!
//! Part bodies are exposed through `Read` and end exactly at the next
//! delimiter; nothing beyond one read buffer is held in memory. A part must be
//! consumed (or is drained) before the next one is opened, preserving the
//! arrival order of attachments.

use std::io::{self, Read};

use crate::mime::headers::{header_param, MimeError, PartHeaders, TransferEncoding};
use crate::mime::transfer::Base64Decoder;

const READ_CHUNK: usize = 8192;
const MAX_LINE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    BeforeHeaders,
    InBody,
    Closed,
}

pub struct MultipartReader<R: Read> {
    inner: R,
    /// CRLF "--" boundary
    delimiter: Vec<u8>,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
    state: ReaderState,
    content_type: String,
}

impl<R: Read> MultipartReader<R> {
    /// Read the message headers, locate the boundary, and skip the preamble.
    pub fn from_message(inner: R) -> Result<Self, MimeError> {
        let mut reader = Self {
            inner,
            delimiter: Vec::new(),
            buf: Vec::with_capacity(READ_CHUNK * 2),
            pos: 0,
            eof: false,
            state: ReaderState::BeforeHeaders,
            content_type: String::new(),
        };

        let fields = reader.read_header_block()?;
        let content_type = fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.clone())
            .ok_or(MimeError::MissingBoundary)?;
        let boundary = header_param(&content_type, "boundary").ok_or(MimeError::MissingBoundary)?;
        if boundary.is_empty() {
            return Err(MimeError::MissingBoundary);
        }
        reader.content_type = content_type;

        let opening = format!("--{}", boundary);
        loop {
            match reader.read_line()? {
                Some(line) if line.trim_end() == opening => break,
                Some(_) => continue,
                None => return Err(MimeError::MissingBoundary),
            }
        }
        reader.delimiter = format!("\r\n--{}", boundary).into_bytes();
        Ok(reader)
    }

    /// Content-Type of the whole message.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Advance to the next part, draining the rest of the current one.
    pub fn next_part(&mut self) -> Result<Option<PartHeaders>, MimeError> {
        if self.state == ReaderState::InBody {
            io::copy(&mut self.raw_body(), &mut io::sink())?;
        }
        match self.state {
            ReaderState::Closed => Ok(None),
            ReaderState::BeforeHeaders => {
                let fields = self.read_header_block()?;
                let headers = PartHeaders::from_fields(fields)?;
                self.state = ReaderState::InBody;
                Ok(Some(headers))
            }
            ReaderState::InBody => Err(MimeError::MalformedHeader("part body not terminated".into())),
        }
    }

    /// Body of the current part, before transfer decoding.
    pub fn raw_body(&mut self) -> RawPartBody<'_, R> {
        RawPartBody { reader: self }
    }

    /// Body of the current part with its transfer encoding removed.
    pub fn body(&mut self, encoding: TransferEncoding) -> PartBody<'_, R> {
        match encoding {
            TransferEncoding::Base64 => PartBody::Base64(Base64Decoder::new(self.raw_body())),
            TransferEncoding::Binary | TransferEncoding::EightBit => PartBody::Plain(self.raw_body()),
        }
    }

    /// True once the closing delimiter was seen.
    pub fn is_closed(&self) -> bool {
        self.state == ReaderState::Closed
    }

    fn fill(&mut self) -> io::Result<bool> {
        if self.eof {
            return Ok(false);
        }
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        let mut chunk = [0u8; READ_CHUNK];
        let n = loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(true)
    }

    fn read_line(&mut self) -> Result<Option<String>, MimeError> {
        loop {
            if let Some(i) = self.buf[self.pos..].iter().position(|&b| b == b'\n') {
                let raw = &self.buf[self.pos..self.pos + i];
                let line = String::from_utf8_lossy(raw).trim_end_matches('\r').to_string();
                self.pos += i + 1;
                return Ok(Some(line));
            }
            if self.buf.len() - self.pos > MAX_LINE {
                return Err(MimeError::MalformedHeader("line too long".into()));
            }
            if !self.fill()? {
                if self.pos < self.buf.len() {
                    let line = String::from_utf8_lossy(&self.buf[self.pos..]).to_string();
                    self.pos = self.buf.len();
                    return Ok(Some(line));
                }
                return Ok(None);
            }
        }
    }

    fn read_header_block(&mut self) -> Result<Vec<(String, String)>, MimeError> {
        let mut fields: Vec<(String, String)> = Vec::new();
        loop {
            let line = self
                .read_line()?
                .ok_or_else(|| MimeError::MalformedHeader("headers not terminated".into()))?;
            if line.is_empty() {
                return Ok(fields);
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                match fields.last_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(line.trim());
                    }
                    None => return Err(MimeError::MalformedHeader(line)),
                }
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| MimeError::MalformedHeader(line.clone()))?;
            fields.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    /// Consume what follows a delimiter: `--` closes the message, otherwise
    /// the rest of the line (transport padding) is skipped.
    fn after_delimiter(&mut self) -> io::Result<()> {
        while self.buf.len() - self.pos < 2 {
            if !self.fill()? {
                break;
            }
        }
        if self.buf[self.pos..].starts_with(b"--") {
            self.pos += 2;
            self.state = ReaderState::Closed;
            return Ok(());
        }
        self.read_line().map_err(|e| match e {
            MimeError::Io(io) => io,
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        })?;
        self.state = ReaderState::BeforeHeaders;
        Ok(())
    }

    fn read_body(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.state != ReaderState::InBody || out.is_empty() {
            return Ok(0);
        }
        let dlen = self.delimiter.len();
        loop {
            let avail = &self.buf[self.pos..];
            if let Some(i) = avail.windows(dlen).position(|w| w == self.delimiter.as_slice()) {
                if i > 0 {
                    let n = i.min(out.len());
                    out[..n].copy_from_slice(&avail[..n]);
                    self.pos += n;
                    return Ok(n);
                }
                self.pos += dlen;
                self.after_delimiter()?;
                return Ok(0);
            }
            if avail.len() >= dlen {
                let safe = avail.len() - (dlen - 1);
                let n = safe.min(out.len());
                out[..n].copy_from_slice(&avail[..n]);
                self.pos += n;
                return Ok(n);
            }
            if !self.fill()? {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "multipart body ended without delimiter",
                ));
            }
        }
    }
}

pub struct RawPartBody<'a, R: Read> {
    reader: &'a mut MultipartReader<R>,
}

impl<'a, R: Read> Read for RawPartBody<'a, R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.reader.read_body(out)
    }
}

pub enum PartBody<'a, R: Read> {
    Plain(RawPartBody<'a, R>),
    Base64(Base64Decoder<RawPartBody<'a, R>>),
}

impl<'a, R: Read> Read for PartBody<'a, R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        match self {
            PartBody::Plain(r) => r.read(out),
            PartBody::Base64(r) => r.read(out),
        }
    }
}
