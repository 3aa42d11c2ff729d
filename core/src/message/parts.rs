//! Named part slots of a composed message.
//!
//! A `PartSet` holds one optional rendered fragment per slot (custom headers
//! are a list). Serialization walks the kind's declared slot order, so an
//! absent slot keeps its position without shifting its neighbours.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartSlot {
    ControlBlock,
    Signature,
    DesiredLanguages,
    FeatureDescription,
    IntermediaryCertificates,
    NonIntermediaryCertificates,
    CustomHeaders,
    TypeHeader,
    Body,
}

pub const REQUEST_ORDER: &[PartSlot] = &[
    PartSlot::ControlBlock,
    PartSlot::Signature,
    PartSlot::DesiredLanguages,
    PartSlot::FeatureDescription,
    PartSlot::IntermediaryCertificates,
    PartSlot::NonIntermediaryCertificates,
    PartSlot::CustomHeaders,
    PartSlot::TypeHeader,
    PartSlot::Body,
];

pub const RESPONSE_ORDER: &[PartSlot] = &[
    PartSlot::ControlBlock,
    PartSlot::Signature,
    PartSlot::FeatureDescription,
    PartSlot::IntermediaryCertificates,
    PartSlot::NonIntermediaryCertificates,
    PartSlot::CustomHeaders,
    PartSlot::TypeHeader,
    PartSlot::Body,
];

pub const FAULT_ORDER: &[PartSlot] = &[PartSlot::ControlBlock, PartSlot::Body];

/// One rendered part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub slot: PartSlot,
    /// Id attribute; the reference target for signatures.
    pub id: String,
    pub xml: String,
}

impl Part {
    pub fn new(slot: PartSlot, id: impl Into<String>, xml: String) -> Self {
        Self { slot, id: id.into(), xml }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartSet {
    pub control_block: Option<Part>,
    pub signature: Option<Part>,
    pub desired_languages: Option<Part>,
    pub feature_description: Option<Part>,
    pub intermediary_certificates: Option<Part>,
    pub non_intermediary_certificates: Option<Part>,
    pub custom_headers: Vec<Part>,
    pub type_header: Option<Part>,
    pub body: Option<Part>,
}

impl PartSet {
    /// Parts in `slot` (zero or more).
    pub fn in_slot(&self, slot: PartSlot) -> Vec<&Part> {
        let single = match slot {
            PartSlot::ControlBlock => &self.control_block,
            PartSlot::Signature => &self.signature,
            PartSlot::DesiredLanguages => &self.desired_languages,
            PartSlot::FeatureDescription => &self.feature_description,
            PartSlot::IntermediaryCertificates => &self.intermediary_certificates,
            PartSlot::NonIntermediaryCertificates => &self.non_intermediary_certificates,
            PartSlot::TypeHeader => &self.type_header,
            PartSlot::Body => &self.body,
            PartSlot::CustomHeaders => return self.custom_headers.iter().collect(),
        };
        single.iter().collect()
    }

    /// Place a part into its slot, replacing what was there.
    pub fn set(&mut self, part: Part) {
        match part.slot {
            PartSlot::ControlBlock => self.control_block = Some(part),
            PartSlot::Signature => self.signature = Some(part),
            PartSlot::DesiredLanguages => self.desired_languages = Some(part),
            PartSlot::FeatureDescription => self.feature_description = Some(part),
            PartSlot::IntermediaryCertificates => self.intermediary_certificates = Some(part),
            PartSlot::NonIntermediaryCertificates => self.non_intermediary_certificates = Some(part),
            PartSlot::CustomHeaders => self.custom_headers.push(part),
            PartSlot::TypeHeader => self.type_header = Some(part),
            PartSlot::Body => self.body = Some(part),
        }
    }

    /// All present parts in `order`.
    pub fn ordered(&self, order: &[PartSlot]) -> Vec<&Part> {
        order.iter().flat_map(|slot| self.in_slot(*slot)).collect()
    }

    /// Present parts in `order` that a signature must reference.
    pub fn signable(&self, order: &[PartSlot]) -> Vec<&Part> {
        order
            .iter()
            .filter(|slot| **slot != PartSlot::Signature)
            .flat_map(|slot| self.in_slot(*slot))
            .collect()
    }
}
