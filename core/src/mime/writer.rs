//! multipart/related writer.
//!
//! Layout:
//!
//! ```text
//! MIME-Version / Content-Type message headers
//! --boundary CRLF part headers CRLF body
//! CRLF --boundary CRLF part headers CRLF body
//! CRLF --boundary-- CRLF
//! ```

use std::io::{self, Write};

use rand::RngCore;

use crate::constants::{BOUNDARY_PREFIX, XML_PART_CID};
use crate::mime::headers::{PartHeaders, TransferEncoding};
use crate::mime::transfer::Base64LineWriter;

pub fn generate_boundary() -> String {
    let mut raw = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut raw);
    format!("{}{}", BOUNDARY_PREFIX, hex::encode(raw))
}

pub struct MultipartWriter<W: Write> {
    out: W,
    boundary: String,
    parts: usize,
}

impl<W: Write> MultipartWriter<W> {
    pub fn new(out: W) -> Self {
        Self::with_boundary(out, generate_boundary())
    }

    pub fn with_boundary(out: W, boundary: String) -> Self {
        Self { out, boundary, parts: 0 }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!(
            "Multipart/Related; boundary=\"{}\"; type=\"text/xml\"; start=\"<{}>\"",
            self.boundary, XML_PART_CID
        )
    }

    pub fn write_message_headers(&mut self) -> io::Result<()> {
        let head = format!("MIME-Version: 1.0\r\nContent-Type: {}\r\n\r\n", self.content_type());
        self.out.write_all(head.as_bytes())
    }

    /// Write the delimiter and headers of the next part and return a writer
    /// for its body.
    pub fn start_part(&mut self, headers: &PartHeaders) -> io::Result<PartWriter<'_, W>> {
        headers.validate().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        if self.parts > 0 {
            self.out.write_all(b"\r\n")?;
        }
        self.out.write_all(b"--")?;
        self.out.write_all(self.boundary.as_bytes())?;
        self.out.write_all(b"\r\n")?;
        self.out.write_all(headers.render().as_bytes())?;
        self.parts += 1;

        let sink = match headers.transfer_encoding {
            TransferEncoding::Base64 => PartSink::Base64(Base64LineWriter::new(&mut self.out)),
            TransferEncoding::Binary | TransferEncoding::EightBit => PartSink::Plain(&mut self.out),
        };
        Ok(PartWriter { sink, written: 0 })
    }

    /// Write the closing delimiter and return the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.write_all(b"\r\n--")?;
        self.out.write_all(self.boundary.as_bytes())?;
        self.out.write_all(b"--\r\n")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

enum PartSink<'a, W: Write> {
    Plain(&'a mut W),
    Base64(Base64LineWriter<&'a mut W>),
}

/// Body writer of one part. Must be finished to flush base64 padding.
pub struct PartWriter<'a, W: Write> {
    sink: PartSink<'a, W>,
    written: u64,
}

impl<'a, W: Write> PartWriter<'a, W> {
    /// Body bytes written before transfer encoding.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(self) -> io::Result<u64> {
        if let PartSink::Base64(b64) = self.sink {
            b64.finish()?;
        }
        Ok(self.written)
    }
}

impl<'a, W: Write> Write for PartWriter<'a, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match &mut self.sink {
            PartSink::Plain(w) => w.write(buf)?,
            PartSink::Base64(w) => w.write(buf)?,
        };
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            PartSink::Plain(w) => w.flush(),
            PartSink::Base64(w) => w.flush(),
        }
    }
}
