//! Owned, namespace-resolved XML events over a quick-xml reader.
//!
//! Prefix resolution is done here rather than by quick-xml's `NsReader` so a
//! fragment can be parsed inside an inherited binding context (the envelope
//! root's declarations). Empty elements are reported as Start + End; comments,
//! processing instructions and the XML declaration are dropped.

use std::fmt;
use std::io::{self, BufRead};
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug)]
pub enum XmlError {
    Syntax(String),
    UnboundPrefix(String),
    Io(io::Error),
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlError::Syntax(msg) => write!(f, "xml syntax error: {}", msg),
            XmlError::UnboundPrefix(p) => write!(f, "unbound namespace prefix: {}", p),
            XmlError::Io(e) => write!(f, "xml read failed: {}", e),
        }
    }
}

impl std::error::Error for XmlError {}

fn map_qx(err: quick_xml::Error) -> XmlError {
    match err {
        quick_xml::Error::Io(shared) => XmlError::Io(match Arc::try_unwrap(shared) {
            Ok(e) => e,
            Err(shared) => io::Error::new(shared.kind(), shared.to_string()),
        }),
        other => XmlError::Syntax(other.to_string()),
    }
}

fn utf8(raw: &[u8]) -> Result<&str, XmlError> {
    std::str::from_utf8(raw).map_err(|e| XmlError::Syntax(format!("invalid utf-8: {}", e)))
}

/// Split `p:local` into (Some(p), local); unprefixed names give (None, name).
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, qname),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub qname: String,
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    pub qname: String,
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
    /// Attributes in document order, namespace declarations excluded.
    pub attrs: Vec<Attr>,
}

impl StartTag {
    pub fn is(&self, ns: &str, local: &str) -> bool {
        self.local == local && self.ns_uri.as_deref() == Some(ns)
    }

    /// Value of an unqualified attribute.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.prefix.is_none() && a.local == local)
            .map(|a| a.value.as_str())
    }

    pub fn attr_ns(&self, ns: &str, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.local == local && a.ns_uri.as_deref() == Some(ns))
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    Start(StartTag),
    End(String),
    Text(String),
}

/// Stack of in-scope prefix bindings. `None` is the default namespace; an
/// empty URI undeclares it.
#[derive(Debug, Clone, Default)]
pub struct NsScope {
    frames: Vec<Vec<(Option<String>, String)>>,
}

impl NsScope {
    pub fn with_bindings(bindings: &[(&str, &str)]) -> Self {
        let base = bindings
            .iter()
            .map(|(p, uri)| (Some(p.to_string()), uri.to_string()))
            .collect();
        Self { frames: vec![base] }
    }

    pub fn push(&mut self, decls: Vec<(Option<String>, String)>) {
        self.frames.push(decls);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NS);
        }
        for frame in self.frames.iter().rev() {
            if let Some((_, uri)) = frame.iter().find(|(p, _)| p.as_deref() == prefix) {
                return if uri.is_empty() { None } else { Some(uri.as_str()) };
            }
        }
        None
    }
}

fn open_tag(scope: &mut NsScope, e: &BytesStart<'_>) -> Result<StartTag, XmlError> {
    let qname = utf8(e.name().as_ref())?.to_string();

    let mut decls = Vec::new();
    let mut raw = Vec::new();
    for a in e.attributes() {
        let a = a.map_err(|err| XmlError::Syntax(err.to_string()))?;
        let key = utf8(a.key.as_ref())?.to_string();
        let value = a.unescape_value().map_err(map_qx)?.into_owned();
        if key == "xmlns" {
            decls.push((None, value));
        } else if let Some(p) = key.strip_prefix("xmlns:") {
            decls.push((Some(p.to_string()), value));
        } else {
            raw.push((key, value));
        }
    }
    scope.push(decls);

    let (prefix, local) = split_qname(&qname);
    let ns_uri = match scope.resolve(prefix) {
        Some(uri) => Some(uri.to_string()),
        None if prefix.is_some() => return Err(XmlError::UnboundPrefix(qname.clone())),
        None => None,
    };

    let mut attrs = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        let (p, l) = split_qname(&key);
        let attr_ns = match p {
            Some(p) => Some(
                scope
                    .resolve(Some(p))
                    .ok_or_else(|| XmlError::UnboundPrefix(key.clone()))?
                    .to_string(),
            ),
            None => None,
        };
        attrs.push(Attr {
            prefix: p.map(str::to_string),
            local: l.to_string(),
            ns_uri: attr_ns,
            qname: key.clone(),
            value,
        });
    }

    Ok(StartTag {
        prefix: prefix.map(str::to_string),
        local: local.to_string(),
        ns_uri,
        attrs,
        qname,
    })
}

/// Pull-style source of owned events.
pub struct XmlEventSource<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    scope: NsScope,
    pending_end: Option<String>,
    depth: usize,
}

impl<R: BufRead> XmlEventSource<R> {
    pub fn new(inner: R) -> Self {
        Self::with_scope(inner, NsScope::default())
    }

    pub fn with_scope(inner: R, scope: NsScope) -> Self {
        Self {
            reader: Reader::from_reader(inner),
            buf: Vec::with_capacity(4096),
            scope,
            pending_end: None,
            depth: 0,
        }
    }

    /// Element depth after the last returned event.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn next_event(&mut self) -> Result<Option<XmlEvent>, XmlError> {
        if let Some(qname) = self.pending_end.take() {
            self.scope.pop();
            self.depth -= 1;
            return Ok(Some(XmlEvent::End(qname)));
        }

        loop {
            self.buf.clear();
            let ev = self.reader.read_event_into(&mut self.buf).map_err(map_qx)?;
            match ev {
                Event::Start(e) => {
                    let tag = open_tag(&mut self.scope, &e)?;
                    self.depth += 1;
                    return Ok(Some(XmlEvent::Start(tag)));
                }
                Event::Empty(e) => {
                    let tag = open_tag(&mut self.scope, &e)?;
                    self.depth += 1;
                    self.pending_end = Some(tag.qname.clone());
                    return Ok(Some(XmlEvent::Start(tag)));
                }
                Event::End(e) => {
                    let qname = utf8(e.name().as_ref())?.to_string();
                    self.scope.pop();
                    self.depth = self.depth.saturating_sub(1);
                    return Ok(Some(XmlEvent::End(qname)));
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(map_qx)?.into_owned();
                    if text.is_empty() {
                        continue;
                    }
                    if self.depth == 0 {
                        if text.trim().is_empty() {
                            continue;
                        }
                        return Err(XmlError::Syntax("text outside the root element".into()));
                    }
                    return Ok(Some(XmlEvent::Text(text)));
                }
                Event::CData(c) => {
                    let text = utf8(&c)?.to_string();
                    if text.is_empty() || self.depth == 0 {
                        continue;
                    }
                    return Ok(Some(XmlEvent::Text(text)));
                }
                Event::Eof => {
                    if self.depth != 0 {
                        return Err(XmlError::Syntax("document ended inside an element".into()));
                    }
                    return Ok(None);
                }
                _ => continue,
            }
        }
    }
}
