//! Digest collection as a side effect of parsing.
//!
//! Observes every event the structural parser sees. Header children and the
//! body that carry an `Id` are canonicalized as they stream by and digested
//! when they close. The signature header itself is not hashed; its
//! `ds:SignedInfo` is captured as canonical bytes for verification.
//!
//! Digest algorithms are only known once the signature header closed. Parts
//! closing before that (the control block) are held as canonical bytes and
//! digested when the algorithms arrive. Parts no reference names are hashed
//! with SHA-256 so the reference count check still sees them.

use std::collections::HashMap;

use tracing::trace;

use crate::constants::ns;
use crate::crypto::{digest, DigestAlg, DigestBuilder};
use crate::signature::CapturedDigests;
use crate::telemetry::TelemetryCounters;
use crate::types::Result;
use crate::xml::{Canonicalizer, XmlEvent};

/// Depth of `soap:Header` / `soap:Body`.
const SECTION_DEPTH: usize = 2;
/// Depth of header children.
const HEADER_CHILD_DEPTH: usize = 3;

enum Sink {
    /// Algorithm not known yet.
    Buffer(Vec<u8>),
    Hash(DigestBuilder),
}

struct Capture {
    uri: String,
    depth: usize,
    canon: Canonicalizer,
    scratch: Vec<u8>,
    sink: Sink,
}

impl Capture {
    fn feed(&mut self, ev: &XmlEvent) {
        self.canon.event(ev, &mut self.scratch);
        match &mut self.sink {
            Sink::Buffer(buf) => buf.extend_from_slice(&self.scratch),
            Sink::Hash(h) => h.update(&self.scratch),
        }
        self.scratch.clear();
    }
}

struct SignedInfoCapture {
    depth: usize,
    canon: Canonicalizer,
    out: Vec<u8>,
}

pub(crate) struct DigestCollector {
    depth: usize,
    in_header: bool,
    capture: Option<Capture>,
    signed_info: Option<SignedInfoCapture>,
    in_signature_header: Option<usize>,
    signature_header: Option<String>,
    algorithms: Option<HashMap<String, DigestAlg>>,
    pending: Vec<(String, Vec<u8>)>,
    captured: CapturedDigests,
    counters: TelemetryCounters,
}

impl DigestCollector {
    pub(crate) fn new() -> Self {
        Self {
            depth: 0,
            in_header: false,
            capture: None,
            signed_info: None,
            in_signature_header: None,
            signature_header: None,
            algorithms: None,
            pending: Vec::new(),
            captured: CapturedDigests::default(),
            counters: TelemetryCounters::default(),
        }
    }

    /// Local name of the signature header for the kind being parsed.
    pub(crate) fn set_signature_header(&mut self, local: &str) {
        self.signature_header = Some(local.to_string());
    }

    /// Algorithm a reference declared for `uri`; SHA-256 when unreferenced.
    pub(crate) fn algorithm_for(&self, uri: &str) -> DigestAlg {
        self.algorithms
            .as_ref()
            .and_then(|m| m.get(uri).copied())
            .unwrap_or(DigestAlg::Sha256)
    }

    /// Reference algorithms became known: flush buffered parts.
    pub(crate) fn set_reference_algorithms(&mut self, algorithms: HashMap<String, DigestAlg>) -> Result<()> {
        self.algorithms = Some(algorithms);
        for (uri, bytes) in std::mem::take(&mut self.pending) {
            let alg = self.algorithm_for(&uri);
            self.record(uri, alg, digest(alg, &bytes))?;
        }
        if let Some(cap) = self.capture.as_mut() {
            if let Sink::Buffer(buf) = &mut cap.sink {
                let alg = self
                    .algorithms
                    .as_ref()
                    .and_then(|m| m.get(&cap.uri).copied())
                    .unwrap_or(DigestAlg::Sha256);
                let mut h = DigestBuilder::new(alg);
                h.update(buf);
                cap.sink = Sink::Hash(h);
            }
        }
        Ok(())
    }

    /// Header closed without a signature: nothing will name algorithms.
    fn header_closed(&mut self) -> Result<()> {
        if self.algorithms.is_none() {
            self.set_reference_algorithms(HashMap::new())?;
        }
        Ok(())
    }

    pub(crate) fn record(&mut self, uri: String, alg: DigestAlg, value: Vec<u8>) -> Result<()> {
        trace!(%uri, ?alg, "part digested");
        self.counters.add_digest();
        self.captured.push(uri, alg, value)
    }

    fn begin(&mut self, uri: String) {
        let sink = match &self.algorithms {
            Some(_) => Sink::Hash(DigestBuilder::new(self.algorithm_for(&uri))),
            None => Sink::Buffer(Vec::new()),
        };
        self.capture = Some(Capture { uri, depth: self.depth, canon: Canonicalizer::new(), scratch: Vec::new(), sink });
    }

    fn close(&mut self, cap: Capture) -> Result<()> {
        match cap.sink {
            Sink::Hash(h) => {
                let alg = h.alg();
                self.record(cap.uri, alg, h.finalize())
            }
            Sink::Buffer(buf) => {
                self.pending.push((cap.uri, buf));
                Ok(())
            }
        }
    }

    pub(crate) fn observe(&mut self, ev: &XmlEvent) -> Result<()> {
        match ev {
            XmlEvent::Start(tag) => {
                self.depth += 1;
                if self.depth == SECTION_DEPTH && tag.is(ns::SOAP, "Header") {
                    self.in_header = true;
                }
                if self.capture.is_none() {
                    let id = tag.attr("Id");
                    let is_sig_header = self.depth == HEADER_CHILD_DEPTH
                        && self.in_header
                        && tag.ns_uri.as_deref() == Some(ns::OSCI)
                        && self.signature_header.as_deref() == Some(tag.local.as_str());
                    if is_sig_header {
                        self.in_signature_header = Some(self.depth);
                    } else if let Some(id) = id {
                        let header_child = self.depth == HEADER_CHILD_DEPTH && self.in_header;
                        let body = self.depth == SECTION_DEPTH && tag.is(ns::SOAP, "Body");
                        if header_child || body {
                            self.begin(format!("#{}", id));
                        }
                    }
                }
                if self.in_signature_header.is_some() && self.signed_info.is_none() && tag.is(ns::DS, "SignedInfo") {
                    self.signed_info = Some(SignedInfoCapture {
                        depth: self.depth,
                        canon: Canonicalizer::new(),
                        out: Vec::new(),
                    });
                }
            }
            XmlEvent::End(_) | XmlEvent::Text(_) => {}
        }

        if let Some(cap) = self.capture.as_mut() {
            cap.feed(ev);
        }
        if let Some(si) = self.signed_info.as_mut() {
            if si.depth > 0 {
                si.canon.event(ev, &mut si.out);
            }
        }

        if let XmlEvent::End(_) = ev {
            if self.capture.as_ref().map(|c| c.depth) == Some(self.depth) {
                if let Some(cap) = self.capture.take() {
                    self.close(cap)?;
                }
            }
            if let Some(si) = self.signed_info.as_mut() {
                if si.depth == self.depth {
                    si.depth = 0;
                    self.captured.signed_info = Some(std::mem::take(&mut si.out));
                }
            }
            if self.in_signature_header == Some(self.depth) {
                self.in_signature_header = None;
            }
            if self.depth == SECTION_DEPTH && self.in_header {
                self.in_header = false;
                self.header_closed()?;
            }
            self.depth -= 1;
        }
        Ok(())
    }

    /// Digests so far, including attachments recorded by the binder.
    pub(crate) fn finish(mut self) -> Result<(CapturedDigests, TelemetryCounters)> {
        if self.algorithms.is_none() {
            self.set_reference_algorithms(HashMap::new())?;
        }
        Ok((self.captured, self.counters))
    }
}
