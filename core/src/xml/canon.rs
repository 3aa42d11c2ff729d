//! Exclusive canonicalization of element subtrees.
//!
//! Works on resolved events, so the same code runs over a composed fragment
//! (sign side) and over a live inbound stream (parse side):
//! - namespace declarations are emitted only where a prefix is visibly
//!   utilized and not already rendered by an output ancestor; default
//!   namespace first, then by prefix
//! - attributes sorted by (namespace URI, local name)
//! - empty elements as start/end pairs, comments dropped
//! - character references per C14N escaping rules

use crate::xml::events::{NsScope, StartTag, XmlError, XmlEvent, XmlEventSource, XML_NS};

/// Escape character data.
pub fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
}

/// Escape an attribute value.
pub fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
}

#[derive(Debug, Default)]
pub struct Canonicalizer {
    /// Declarations rendered on each open output element.
    rendered: Vec<Vec<(Option<String>, String)>>,
    scratch: String,
}

impl Canonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open output elements.
    pub fn depth(&self) -> usize {
        self.rendered.len()
    }

    fn in_effect(&self, prefix: Option<&str>) -> Option<&str> {
        for frame in self.rendered.iter().rev() {
            if let Some((_, uri)) = frame.iter().find(|(p, _)| p.as_deref() == prefix) {
                return Some(uri.as_str());
            }
        }
        None
    }

    fn require(&self, needed: &mut Vec<(Option<String>, String)>, prefix: Option<&str>, uri: &str) {
        if prefix == Some("xml") && uri == XML_NS {
            return;
        }
        if needed.iter().any(|(p, _)| p.as_deref() == prefix) {
            return;
        }
        let current = self.in_effect(prefix).unwrap_or("");
        if current != uri {
            needed.push((prefix.map(str::to_string), uri.to_string()));
        }
    }

    pub fn start(&mut self, tag: &StartTag, out: &mut Vec<u8>) {
        let mut needed: Vec<(Option<String>, String)> = Vec::new();
        match &tag.ns_uri {
            Some(uri) => self.require(&mut needed, tag.prefix.as_deref(), uri),
            None => self.require(&mut needed, None, ""),
        }
        for a in &tag.attrs {
            if let (Some(p), Some(uri)) = (&a.prefix, &a.ns_uri) {
                self.require(&mut needed, Some(p), uri);
            }
        }
        needed.sort_by(|a, b| match (&a.0, &b.0) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(y),
        });

        let mut attrs: Vec<_> = tag.attrs.iter().collect();
        attrs.sort_by(|a, b| {
            let ka = (a.ns_uri.as_deref().unwrap_or(""), a.local.as_str());
            let kb = (b.ns_uri.as_deref().unwrap_or(""), b.local.as_str());
            ka.cmp(&kb)
        });

        let s = &mut self.scratch;
        s.clear();
        s.push('<');
        s.push_str(&tag.qname);
        for (p, uri) in &needed {
            match p {
                Some(p) => {
                    s.push_str(" xmlns:");
                    s.push_str(p);
                }
                None => s.push_str(" xmlns"),
            }
            s.push_str("=\"");
            escape_attr(uri, s);
            s.push('"');
        }
        for a in attrs {
            s.push(' ');
            s.push_str(&a.qname);
            s.push_str("=\"");
            escape_attr(&a.value, s);
            s.push('"');
        }
        s.push('>');
        out.extend_from_slice(s.as_bytes());
        self.rendered.push(needed);
    }

    pub fn end(&mut self, qname: &str, out: &mut Vec<u8>) {
        self.rendered.pop();
        out.extend_from_slice(b"</");
        out.extend_from_slice(qname.as_bytes());
        out.push(b'>');
    }

    pub fn text(&mut self, text: &str, out: &mut Vec<u8>) {
        self.scratch.clear();
        escape_text(text, &mut self.scratch);
        out.extend_from_slice(self.scratch.as_bytes());
    }

    pub fn event(&mut self, ev: &XmlEvent, out: &mut Vec<u8>) {
        match ev {
            XmlEvent::Start(tag) => self.start(tag, out),
            XmlEvent::End(qname) => self.end(qname, out),
            XmlEvent::Text(text) => self.text(text, out),
        }
    }
}

/// Canonical bytes of a standalone fragment parsed in `bindings` context.
pub fn canonicalize_fragment(xml: &str, bindings: &[(&str, &str)]) -> Result<Vec<u8>, XmlError> {
    let mut source = XmlEventSource::with_scope(xml.as_bytes(), NsScope::with_bindings(bindings));
    let mut canon = Canonicalizer::new();
    let mut out = Vec::with_capacity(xml.len());
    while let Some(ev) = source.next_event()? {
        canon.event(&ev, &mut out);
    }
    Ok(out)
}
