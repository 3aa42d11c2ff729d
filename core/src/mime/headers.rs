//! Part headers and transfer encodings.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum MimeError {
    /// No usable boundary in the message headers, or the first delimiter
    /// never appeared.
    MissingBoundary,
    MalformedHeader(String),
    Io(io::Error),
}

impl fmt::Display for MimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MimeError::MissingBoundary => write!(f, "multipart boundary missing"),
            MimeError::MalformedHeader(h) => write!(f, "malformed MIME header: {}", h),
            MimeError::Io(e) => write!(f, "MIME read failed: {}", e),
        }
    }
}

impl std::error::Error for MimeError {}

impl From<io::Error> for MimeError {
    fn from(e: io::Error) -> Self {
        MimeError::Io(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    #[default]
    Binary,
    EightBit,
    Base64,
}

impl TransferEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferEncoding::Binary => "binary",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::Base64 => "base64",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, MimeError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "binary" | "7bit" => Ok(TransferEncoding::Binary),
            "8bit" => Ok(TransferEncoding::EightBit),
            "base64" => Ok(TransferEncoding::Base64),
            other => Err(MimeError::MalformedHeader(format!("Content-Transfer-Encoding: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartHeaders {
    pub content_type: String,
    /// Content-ID without angle brackets.
    pub content_id: Option<String>,
    pub transfer_encoding: TransferEncoding,
    pub extra: Vec<(String, String)>,
}

impl PartHeaders {
    pub fn new(content_type: impl Into<String>, content_id: impl Into<String>, enc: TransferEncoding) -> Self {
        Self {
            content_type: content_type.into(),
            content_id: Some(content_id.into()),
            transfer_encoding: enc,
            extra: Vec::new(),
        }
    }

    pub(crate) fn from_fields(fields: Vec<(String, String)>) -> Result<Self, MimeError> {
        let mut headers = PartHeaders::default();
        for (name, value) in fields {
            match name.to_ascii_lowercase().as_str() {
                "content-type" => headers.content_type = value,
                "content-id" => {
                    let id = value.trim().trim_start_matches('<').trim_end_matches('>');
                    headers.content_id = Some(id.to_string());
                }
                "content-transfer-encoding" => headers.transfer_encoding = TransferEncoding::parse(&value)?,
                _ => headers.extra.push((name, value)),
            }
        }
        Ok(headers)
    }

    /// Header values must stay on one line.
    pub fn validate(&self) -> Result<(), MimeError> {
        let mut fields = vec![("Content-Type", self.content_type.as_str())];
        if let Some(id) = &self.content_id {
            fields.push(("Content-ID", id.as_str()));
        }
        for (name, value) in &self.extra {
            if name.is_empty() || name.chars().any(|c| c == ':' || c.is_whitespace() || c.is_control()) {
                return Err(MimeError::MalformedHeader(format!("invalid header name {:?}", name)));
            }
            fields.push((name.as_str(), value.as_str()));
        }
        match fields.iter().find(|(_, value)| value.chars().any(char::is_control)) {
            Some((name, _)) => Err(MimeError::MalformedHeader(format!("{} carries a control character", name))),
            None => Ok(()),
        }
    }

    pub(crate) fn render(&self) -> String {
        let mut out = String::with_capacity(128);
        out.push_str("Content-Type: ");
        out.push_str(&self.content_type);
        out.push_str("\r\n");
        out.push_str("Content-Transfer-Encoding: ");
        out.push_str(self.transfer_encoding.as_str());
        out.push_str("\r\n");
        if let Some(id) = &self.content_id {
            out.push_str("Content-ID: <");
            out.push_str(id);
            out.push_str(">\r\n");
        }
        for (k, v) in &self.extra {
            out.push_str(k);
            out.push_str(": ");
            out.push_str(v);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out
    }
}

/// Extract a parameter (e.g. `boundary`) from a structured header value.
pub fn header_param(value: &str, name: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (k, v) = param.split_once('=')?;
        if !k.trim().eq_ignore_ascii_case(name) {
            return None;
        }
        Some(v.trim().trim_matches('"').to_string())
    })
}
