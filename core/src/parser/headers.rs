//! Sub-parsers for the shared headers and the type header.

use crate::fault::FaultCode;
use crate::message::{
    parse_timestamp, CertificateEntry, CertificateUsage, ControlBlock, DesiredLanguages, Feature, FeatureDescription,
    Feedback, Inspection, InspectionResult, ProcessCardBundle, Selection, SelectionMode, SelectionRule, TypeHeader,
};
use crate::parser::subtree::{ends_with, is_path, required, ElementHandler};
use crate::roles::{Certificate, Role, RoleKind};
use crate::types::{OsciError, Result};
use crate::xml::{StartTag, XML_NS};

#[derive(Default)]
pub(crate) struct ControlBlockHandler {
    pub(crate) cb: ControlBlock,
}

impl ElementHandler for ControlBlockHandler {
    fn start(&mut self, path: &[String], tag: &StartTag) -> Result<()> {
        if path.len() == 1 {
            self.cb.conversation_id = tag.attr("ConversationId").map(str::to_string);
            if let Some(raw) = tag.attr("SequenceNumber") {
                let n = raw.trim().parse::<u32>().map_err(|_| {
                    OsciError::parse(FaultCode::SequenceNumberInvalid, format!("sequence number {:?}", raw))
                })?;
                self.cb.sequence_number = Some(n);
            }
        }
        Ok(())
    }

    fn end(&mut self, path: &[String], text: String) -> Result<()> {
        if is_path(path, &["ControlBlock", "Response"]) {
            self.cb.response = Some(text);
        } else if is_path(path, &["ControlBlock", "Challenge"]) {
            self.cb.challenge = Some(text);
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct LanguagesHandler {
    pub(crate) languages: DesiredLanguages,
}

impl ElementHandler for LanguagesHandler {
    fn start(&mut self, path: &[String], tag: &StartTag) -> Result<()> {
        if path.len() == 1 {
            self.languages = DesiredLanguages::parse_list(required(tag, "LanguagesList")?);
        }
        Ok(())
    }

    fn end(&mut self, _path: &[String], _text: String) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FeaturesHandler {
    pub(crate) features: FeatureDescription,
}

impl ElementHandler for FeaturesHandler {
    fn start(&mut self, path: &[String], tag: &StartTag) -> Result<()> {
        if ends_with(path, &["SupportedFeatures", "Feature"]) {
            self.features.features.push(Feature {
                key: required(tag, "Key")?.to_string(),
                version: required(tag, "Version")?.to_string(),
            });
        }
        Ok(())
    }

    fn end(&mut self, _path: &[String], _text: String) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct CertificatesHandler {
    pending: Option<(RoleKind, CertificateUsage)>,
    pub(crate) entries: Vec<CertificateEntry>,
}

impl ElementHandler for CertificatesHandler {
    fn start(&mut self, path: &[String], tag: &StartTag) -> Result<()> {
        if path.len() == 2 {
            let usage = CertificateUsage::from_element(&tag.local)
                .ok_or_else(|| OsciError::malformed(format!("unexpected {} in certificate header", tag.qname)))?;
            let role_name = required(tag, "Role")?;
            let role = RoleKind::parse(role_name)
                .ok_or_else(|| OsciError::malformed(format!("unknown certificate role {}", role_name)))?;
            self.pending = Some((role, usage));
        }
        Ok(())
    }

    fn end(&mut self, path: &[String], text: String) -> Result<()> {
        if ends_with(path, &["X509Data", "X509Certificate"]) {
            let (role, usage) = self
                .pending
                .ok_or_else(|| OsciError::malformed("certificate outside a role entry"))?;
            let certificate = Certificate::from_base64(&text)
                .map_err(|e| OsciError::malformed(format!("certificate: {}", e)))?;
            self.entries.push(CertificateEntry { role, usage, certificate });
        } else if path.len() == 2 {
            self.pending = None;
        }
        Ok(())
    }
}

/// Group certificate entries back into roles. A new author or reader role
/// starts when the current one already holds a certificate of that usage.
pub(crate) fn roles_from_entries(entries: Vec<CertificateEntry>) -> Vec<Role> {
    let mut roles: Vec<Role> = Vec::new();
    for entry in entries {
        let usage = entry.usage;
        let has_room = |r: &Role| match usage {
            CertificateUsage::Cipher => r.cipher_certificate.is_none(),
            CertificateUsage::Signature => r.signature_certificate.is_none(),
        };
        let idx = match roles.iter().rposition(|r| r.kind == entry.role) {
            Some(i) if has_room(&roles[i]) => i,
            _ => {
                roles.push(Role::new(entry.role));
                roles.len() - 1
            }
        };
        match entry.usage {
            CertificateUsage::Cipher => roles[idx].cipher_certificate = Some(entry.certificate),
            CertificateUsage::Signature => roles[idx].signature_certificate = Some(entry.certificate),
        }
    }
    roles
}

#[derive(Default)]
pub(crate) struct TypeHeaderHandler {
    pub(crate) header: TypeHeader,
    selection: Option<(SelectionMode, Option<u32>, Vec<String>, Option<String>)>,
    entry_lang: String,
    entry_code: String,
    bundle: Option<ProcessCardBundle>,
    inspection: (Option<String>, Option<String>, Option<String>),
}

fn stamp(text: &str, what: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    parse_timestamp(text).ok_or_else(|| OsciError::malformed(format!("{} is not a timestamp: {:?}", what, text)))
}

impl ElementHandler for TypeHeaderHandler {
    fn start(&mut self, path: &[String], tag: &StartTag) -> Result<()> {
        if is_path(&path[1..], &["SelectionRule"]) {
            let mode = match tag.attr("SelectionMode") {
                Some(raw) => SelectionMode::parse(raw)
                    .ok_or_else(|| OsciError::malformed(format!("selection mode {:?}", raw)))?,
                None => SelectionMode::All,
            };
            let quantity = match tag.attr("Quantity") {
                Some(raw) => Some(
                    raw.trim()
                        .parse::<u32>()
                        .map_err(|_| OsciError::malformed(format!("selection quantity {:?}", raw)))?,
                ),
                None => None,
            };
            self.selection = Some((mode, quantity, Vec::new(), None));
        } else if ends_with(path, &["Feedback", "Entry"]) {
            self.entry_lang = tag.attr_ns(XML_NS, "lang").unwrap_or_default().to_string();
            self.entry_code.clear();
        } else if is_path(&path[1..], &["ProcessCardBundle"]) {
            self.bundle = Some(ProcessCardBundle::new(String::new()));
        } else if ends_with(path, &["InspectionReport", "Inspection"]) {
            self.inspection = (None, None, None);
        }
        Ok(())
    }

    fn end(&mut self, path: &[String], text: String) -> Result<()> {
        let rel: Vec<&str> = path[1..].iter().map(String::as_str).collect();
        match rel.as_slice() {
            ["MessageId"] => self.header.message_id = Some(text),
            ["Subject"] => self.header.subject = Some(text),
            ["Recipient"] => self.header.recipient = Some(text),
            ["SelectionRule", "MessageId"] => {
                if let Some(sel) = self.selection.as_mut() {
                    sel.2.push(text);
                }
            }
            ["SelectionRule", "ReceptionOfDelivery"] => {
                if let Some(sel) = self.selection.as_mut() {
                    sel.3 = Some(text);
                }
            }
            ["SelectionRule"] => {
                if let Some((mode, quantity, ids, after)) = self.selection.take() {
                    let rule = match after {
                        Some(ts) => SelectionRule::ReceivedAfter(stamp(&ts, "ReceptionOfDelivery")?),
                        None => SelectionRule::MessageIds(ids),
                    };
                    self.header.selection = Some(Selection { rule, mode, quantity });
                }
            }
            ["Feedback", "Entry", "Code"] => self.entry_code = text,
            ["Feedback", "Entry", "Text"] => self.header.feedback.push(Feedback {
                language: self.entry_lang.clone(),
                code: std::mem::take(&mut self.entry_code),
                text,
            }),
            ["ProcessCardBundle", rest @ ..] => self.bundle_end(rest, text)?,
            _ => {}
        }
        Ok(())
    }
}

impl TypeHeaderHandler {
    fn bundle_end(&mut self, rest: &[&str], text: String) -> Result<()> {
        if rest.is_empty() {
            if let Some(bundle) = self.bundle.take() {
                self.header.process_cards.push(bundle);
            }
            return Ok(());
        }
        let bundle = self
            .bundle
            .as_mut()
            .ok_or_else(|| OsciError::malformed("process card outside its bundle"))?;
        match rest {
            ["MessageId"] => bundle.message_id = text,
            ["ProcessCard", "Creation"] => bundle.process_card.creation = Some(stamp(&text, "Creation")?),
            ["ProcessCard", "Forwarding"] => bundle.process_card.forwarding = Some(stamp(&text, "Forwarding")?),
            ["ProcessCard", "Reception"] => bundle.process_card.reception = Some(stamp(&text, "Reception")?),
            ["ProcessCard", "Subject"] => bundle.process_card.subject = Some(text),
            ["InspectionReport", "Inspection", "Timestamp"] => self.inspection.0 = Some(text),
            ["InspectionReport", "Inspection", "Reference"] => self.inspection.1 = Some(text),
            ["InspectionReport", "Inspection", "Result"] => self.inspection.2 = Some(text),
            ["InspectionReport", "Inspection"] => {
                let (ts, reference, result) = std::mem::take(&mut self.inspection);
                let missing = || OsciError::malformed("incomplete inspection entry");
                let result = result.ok_or_else(missing)?;
                bundle.inspections.push(Inspection {
                    timestamp: stamp(&ts.ok_or_else(missing)?, "Timestamp")?,
                    reference: reference.ok_or_else(missing)?,
                    result: InspectionResult::parse(&result)
                        .ok_or_else(|| OsciError::malformed(format!("inspection result {:?}", result)))?,
                });
            }
            _ => {}
        }
        Ok(())
    }
}
