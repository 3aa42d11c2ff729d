//! Message kinds (closed registry).
//!
//! Each kind fixes its schema identifier, type header, signature header,
//! conversation-id requirement, and part order.

use std::fmt;

use num_enum::TryFromPrimitive;

use crate::constants::part_ids;
use crate::message::parts::{PartSlot, FAULT_ORDER, REQUEST_ORDER, RESPONSE_ORDER};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum MessageKind {
    InitDialog                = 0x01,
    ExitDialog                = 0x02,
    GetMessageId              = 0x03,
    StoreDelivery             = 0x04,
    FetchDelivery             = 0x05,
    FetchProcessCard          = 0x06,
    ForwardDelivery           = 0x07,
    AcceptDelivery            = 0x08,
    MediateDelivery           = 0x09,
    ProcessDelivery           = 0x0A,

    ResponseToInitDialog      = 0x41,
    ResponseToExitDialog      = 0x42,
    ResponseToGetMessageId    = 0x43,
    ResponseToStoreDelivery   = 0x44,
    ResponseToFetchDelivery   = 0x45,
    ResponseToFetchProcessCard = 0x46,
    ResponseToForwardDelivery = 0x47,
    ResponseToAcceptDelivery  = 0x48,
    ResponseToMediateDelivery = 0x49,
    ResponseToProcessDelivery = 0x4A,

    Fault                     = 0x7F,
}

/// (kind, schema file, type header local name)
const REGISTRY: &[(MessageKind, &str, &str)] = &[
    (MessageKind::InitDialog, "soapInitDialog.xsd", "InitDialog"),
    (MessageKind::ExitDialog, "soapExitDialog.xsd", "ExitDialog"),
    (MessageKind::GetMessageId, "soapGetMessageId.xsd", "GetMessageId"),
    (MessageKind::StoreDelivery, "soapStoreDelivery.xsd", "StoreDelivery"),
    (MessageKind::FetchDelivery, "soapFetchDelivery.xsd", "FetchDelivery"),
    (MessageKind::FetchProcessCard, "soapFetchProcessCard.xsd", "FetchProcessCard"),
    (MessageKind::ForwardDelivery, "soapForwardDelivery.xsd", "ForwardDelivery"),
    (MessageKind::AcceptDelivery, "soapAcceptDelivery.xsd", "AcceptDelivery"),
    (MessageKind::MediateDelivery, "soapMediateDelivery.xsd", "MediateDelivery"),
    (MessageKind::ProcessDelivery, "soapProcessDelivery.xsd", "ProcessDelivery"),
    (MessageKind::ResponseToInitDialog, "soapResponseToInitDialog.xsd", "responseToInitDialog"),
    (MessageKind::ResponseToExitDialog, "soapResponseToExitDialog.xsd", "responseToExitDialog"),
    (MessageKind::ResponseToGetMessageId, "soapResponseToGetMessageId.xsd", "responseToGetMessageId"),
    (MessageKind::ResponseToStoreDelivery, "soapResponseToStoreDelivery.xsd", "responseToStoreDelivery"),
    (MessageKind::ResponseToFetchDelivery, "soapResponseToFetchDelivery.xsd", "responseToFetchDelivery"),
    (MessageKind::ResponseToFetchProcessCard, "soapResponseToFetchProcessCard.xsd", "responseToFetchProcessCard"),
    (MessageKind::ResponseToForwardDelivery, "soapResponseToForwardDelivery.xsd", "responseToForwardDelivery"),
    (MessageKind::ResponseToAcceptDelivery, "soapResponseToAcceptDelivery.xsd", "responseToAcceptDelivery"),
    (MessageKind::ResponseToMediateDelivery, "soapResponseToMediateDelivery.xsd", "responseToMediateDelivery"),
    (MessageKind::ResponseToProcessDelivery, "soapResponseToProcessDelivery.xsd", "responseToProcessDelivery"),
];

impl MessageKind {
    pub fn all() -> impl Iterator<Item = MessageKind> {
        REGISTRY.iter().map(|(k, _, _)| *k).chain(std::iter::once(MessageKind::Fault))
    }

    fn entry(&self) -> Option<&'static (MessageKind, &'static str, &'static str)> {
        REGISTRY.iter().find(|(k, _, _)| k == self)
    }

    /// Schema identifier; `None` for faults.
    pub fn schema(&self) -> Option<&'static str> {
        self.entry().map(|(_, schema, _)| *schema)
    }

    pub fn from_schema(schema: &str) -> Option<Self> {
        REGISTRY.iter().find(|(_, s, _)| *s == schema).map(|(k, _, _)| *k)
    }

    /// Local name of the type header element.
    pub fn type_header(&self) -> Option<&'static str> {
        self.entry().map(|(_, _, header)| *header)
    }

    pub fn from_type_header(local: &str) -> Option<Self> {
        REGISTRY.iter().find(|(_, _, h)| *h == local).map(|(k, _, _)| *k)
    }

    /// Id attribute of the type header element.
    pub fn type_header_id(&self) -> Option<String> {
        self.type_header().map(|h| h.to_ascii_lowercase())
    }

    pub fn is_request(&self) -> bool {
        (*self as u8) < 0x40
    }

    pub fn is_fault(&self) -> bool {
        *self == MessageKind::Fault
    }

    /// Matching response kind of a request.
    pub fn response_kind(&self) -> Option<MessageKind> {
        if !self.is_request() {
            return None;
        }
        MessageKind::try_from(*self as u8 + 0x40).ok()
    }

    /// Matching request kind of a response.
    pub fn request_kind(&self) -> Option<MessageKind> {
        if self.is_request() || self.is_fault() {
            return None;
        }
        MessageKind::try_from(*self as u8 - 0x40).ok()
    }

    /// (element local name, Id) of the signature header.
    pub fn signature_header(&self) -> (&'static str, &'static str) {
        if self.is_request() {
            ("ClientSignature", part_ids::CLIENT_SIGNATURE)
        } else {
            ("SupplierSignature", part_ids::SUPPLIER_SIGNATURE)
        }
    }

    pub fn requires_conversation_id(&self) -> bool {
        matches!(
            self,
            MessageKind::ExitDialog | MessageKind::ResponseToInitDialog | MessageKind::ResponseToExitDialog
        )
    }

    /// Kinds whose body carries content containers and encrypted data.
    pub fn carries_content(&self) -> bool {
        matches!(
            self,
            MessageKind::StoreDelivery
                | MessageKind::ForwardDelivery
                | MessageKind::AcceptDelivery
                | MessageKind::MediateDelivery
                | MessageKind::ProcessDelivery
                | MessageKind::ResponseToFetchDelivery
                | MessageKind::ResponseToMediateDelivery
                | MessageKind::ResponseToProcessDelivery
        )
    }

    pub fn part_order(&self) -> &'static [PartSlot] {
        if self.is_fault() {
            FAULT_ORDER
        } else if self.is_request() {
            REQUEST_ORDER
        } else {
            RESPONSE_ORDER
        }
    }

    pub fn name(&self) -> &'static str {
        match self.entry() {
            Some((_, _, header)) if self.is_request() => header,
            Some((_, schema, _)) => schema.trim_start_matches("soap").trim_end_matches(".xsd"),
            None => "Fault",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
