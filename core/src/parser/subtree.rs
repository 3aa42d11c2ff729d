//! Path-tracking driver for sub-parsers.
//!
//! A sub-parser owns the events of one element subtree. The driver keeps the
//! local-name path from the subtree root and the direct text of each open
//! element, so handlers match on paths like `["Entry", "Code"]` instead of
//! tracking depth themselves.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::types::{OsciError, Result};
use crate::xml::{StartTag, XmlEvent};

pub(crate) trait ElementHandler {
    /// An element opened. `path` ends with its local name.
    fn start(&mut self, path: &[String], tag: &StartTag) -> Result<()>;

    /// An element closed with its direct text content.
    fn end(&mut self, path: &[String], text: String) -> Result<()>;
}

pub(crate) struct Subtree<H> {
    handler: H,
    path: Vec<String>,
    texts: Vec<String>,
}

impl<H: ElementHandler> Subtree<H> {
    /// Start a subtree at `root`, which the caller already consumed.
    pub(crate) fn new(root: &StartTag, mut handler: H) -> Result<Self> {
        let path = vec![root.local.clone()];
        handler.start(&path, root)?;
        Ok(Self { handler, path, texts: vec![String::new()] })
    }

    /// Feed one event; returns true when the root closed.
    pub(crate) fn event(&mut self, ev: &XmlEvent) -> Result<bool> {
        match ev {
            XmlEvent::Start(tag) => {
                self.path.push(tag.local.clone());
                self.texts.push(String::new());
                self.handler.start(&self.path, tag)?;
                Ok(false)
            }
            XmlEvent::Text(t) => {
                if let Some(last) = self.texts.last_mut() {
                    last.push_str(t);
                }
                Ok(false)
            }
            XmlEvent::End(_) => {
                let text = self.texts.pop().unwrap_or_default();
                self.handler.end(&self.path, text)?;
                self.path.pop();
                Ok(self.path.is_empty())
            }
        }
    }

    pub(crate) fn into_inner(self) -> H {
        self.handler
    }
}

/// True when `path` ends with `suffix`.
pub(crate) fn ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len() && path[path.len() - suffix.len()..].iter().zip(suffix).all(|(a, b)| a == b)
}

/// True when `path` equals `expected` exactly.
pub(crate) fn is_path(path: &[String], expected: &[&str]) -> bool {
    path.len() == expected.len() && ends_with(path, expected)
}

pub(crate) fn decode_b64(text: &str, what: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| OsciError::malformed(format!("{} is not valid base64: {}", what, e)))
}

pub(crate) fn required<'a>(tag: &'a StartTag, attr: &str) -> Result<&'a str> {
    tag.attr(attr)
        .ok_or_else(|| OsciError::malformed(format!("{} lacks attribute {}", tag.qname, attr)))
}
