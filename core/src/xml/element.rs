//! Minimal element builder used by the composer.
//!
//! Rendering emits no namespace declarations (the envelope root binds all
//! prefixes), no insignificant whitespace, and start/end pairs for empty
//! elements, so a rendered part is already close to its canonical form.

use crate::constants::ns;
use crate::xml::canon::{escape_attr, escape_text};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    /// Pre-rendered markup inserted verbatim.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    qname: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(prefix: &str, local: &str) -> Self {
        Self { qname: format!("{}:{}", prefix, local), attrs: Vec::new(), children: Vec::new() }
    }

    /// Element in no namespace.
    pub fn unqualified(local: &str) -> Self {
        Self { qname: local.to_string(), attrs: Vec::new(), children: Vec::new() }
    }

    pub fn soap(local: &str) -> Self {
        Self::new(ns::SOAP_PREFIX, local)
    }

    pub fn osci(local: &str) -> Self {
        Self::new(ns::OSCI_PREFIX, local)
    }

    pub fn ds(local: &str) -> Self {
        Self::new(ns::DS_PREFIX, local)
    }

    pub fn xenc(local: &str) -> Self {
        Self::new(ns::XENC_PREFIX, local)
    }

    pub fn qname(&self) -> &str {
        &self.qname
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.push((name.to_string(), value.into()));
        self
    }

    pub fn attr_opt(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.attr(name, v),
            None => self,
        }
    }

    pub fn child(mut self, el: XmlElement) -> Self {
        self.children.push(XmlNode::Element(el));
        self
    }

    pub fn child_opt(self, el: Option<XmlElement>) -> Self {
        match el {
            Some(el) => self.child(el),
            None => self,
        }
    }

    pub fn children(mut self, els: impl IntoIterator<Item = XmlElement>) -> Self {
        self.children.extend(els.into_iter().map(XmlNode::Element));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn raw(mut self, markup: impl Into<String>) -> Self {
        self.children.push(XmlNode::Raw(markup.into()));
        self
    }

    pub fn push(&mut self, el: XmlElement) {
        self.children.push(XmlNode::Element(el));
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(256);
        self.write_to(&mut out);
        out
    }

    pub fn write_to(&self, out: &mut String) {
        self.write_open(out, &[]);
        self.write_body(out);
        self.write_close(out);
    }

    /// Opening tag with extra leading attributes (used for the root's
    /// namespace declarations).
    pub fn write_open(&self, out: &mut String, extra: &[(String, String)]) {
        out.push('<');
        out.push_str(&self.qname);
        for (k, v) in extra.iter().chain(self.attrs.iter()) {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            escape_attr(v, out);
            out.push('"');
        }
        out.push('>');
    }

    pub fn write_body(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Element(el) => el.write_to(out),
                XmlNode::Text(t) => escape_text(t, out),
                XmlNode::Raw(r) => out.push_str(r),
            }
        }
    }

    pub fn write_close(&self, out: &mut String) {
        out.push_str("</");
        out.push_str(&self.qname);
        out.push('>');
    }
}
