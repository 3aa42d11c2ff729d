//! Process cards issued by the intermediary and their inspection reports.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::xml::XmlElement;

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim()).ok().map(|t| t.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectionResult {
    Ok,
    Corrupted,
    Indeterminate,
}

impl InspectionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionResult::Ok => "ok",
            InspectionResult::Corrupted => "corrupted",
            InspectionResult::Indeterminate => "indeterminate",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "ok" => Some(InspectionResult::Ok),
            "corrupted" => Some(InspectionResult::Corrupted),
            "indeterminate" => Some(InspectionResult::Indeterminate),
            _ => None,
        }
    }
}

/// Result of checking one signed or encrypted item on the way through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub reference: String,
    pub timestamp: DateTime<Utc>,
    pub result: InspectionResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessCard {
    pub creation: Option<DateTime<Utc>>,
    pub forwarding: Option<DateTime<Utc>>,
    pub reception: Option<DateTime<Utc>>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCardBundle {
    pub message_id: String,
    pub process_card: ProcessCard,
    pub inspections: Vec<Inspection>,
}

impl ProcessCardBundle {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self { message_id: message_id.into(), process_card: ProcessCard::default(), inspections: Vec::new() }
    }

    /// True when no inspection reported a problem.
    pub fn all_inspections_ok(&self) -> bool {
        self.inspections.iter().all(|i| i.result == InspectionResult::Ok)
    }

    pub fn to_xml(&self) -> XmlElement {
        let card = &self.process_card;
        let stamp = |local: &str, ts: &Option<DateTime<Utc>>| {
            ts.as_ref().map(|t| XmlElement::osci(local).text(format_timestamp(t)))
        };
        let card_el = XmlElement::osci("ProcessCard")
            .child_opt(stamp("Creation", &card.creation))
            .child_opt(stamp("Forwarding", &card.forwarding))
            .child_opt(stamp("Reception", &card.reception))
            .child_opt(card.subject.as_ref().map(|s| XmlElement::osci("Subject").text(s.clone())));

        let report = XmlElement::osci("InspectionReport").children(self.inspections.iter().map(|i| {
            XmlElement::osci("Inspection")
                .child(XmlElement::osci("Timestamp").text(format_timestamp(&i.timestamp)))
                .child(XmlElement::osci("Reference").text(i.reference.clone()))
                .child(XmlElement::osci("Result").text(i.result.as_str()))
        }));

        XmlElement::osci("ProcessCardBundle")
            .child(XmlElement::osci("MessageId").text(self.message_id.clone()))
            .child(card_el)
            .child(report)
    }
}
