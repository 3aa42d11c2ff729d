//! Binding of trailing MIME parts to the attachment placeholders the XML
//! declared.
//!
//! Parts are consumed in arrival order. A part is bound by content id before
//! any of its bytes are read; each body is digested in full while at most
//! the retention cap is kept in memory.

use std::io::Read;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::crypto::DigestBuilder;
use crate::fault::FaultCode;
use crate::message::{Attachment, AttachmentState, CID_PREFIX};
use crate::mime::MultipartReader;
use crate::parser::collector::DigestCollector;
use crate::telemetry::TelemetryCounters;
use crate::types::{OsciError, Result};

const READ_CHUNK: usize = 16 * 1024;

pub(crate) fn bind_attachments<R: Read>(
    reader: &mut MultipartReader<R>,
    placeholders: &mut [Attachment],
    collector: &mut DigestCollector,
    retention: Option<usize>,
    counters: &mut TelemetryCounters,
) -> Result<()> {
    while let Some(headers) = reader.next_part()? {
        let cid = headers
            .content_id
            .clone()
            .ok_or_else(|| OsciError::parse(FaultCode::AttachmentUnmatched, "MIME part without Content-ID"))?;
        let att = placeholders
            .iter_mut()
            .find(|a| a.ref_id() == cid)
            .ok_or_else(|| {
                OsciError::parse(FaultCode::AttachmentUnmatched, format!("MIME part {} matches no reference", cid))
            })?;
        if matches!(att.state(), AttachmentState::Parsing | AttachmentState::Complete) {
            return Err(OsciError::parse(FaultCode::AttachmentUnmatched, format!("MIME part {} occurs twice", cid)));
        }
        att.begin_parsing(&headers.content_type);

        let uri = format!("{}{}", CID_PREFIX, cid);
        let mut hasher = DigestBuilder::new(collector.algorithm_for(&uri));
        let mut kept = Vec::new();
        let mut truncated = false;
        let mut buf = vec![0u8; READ_CHUNK];
        let mut body = reader.body(headers.transfer_encoding);
        loop {
            let n = body.read(&mut buf).map_err(OsciError::from_read)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            let room = match retention {
                Some(cap) => cap.saturating_sub(kept.len()),
                None => n,
            };
            let take = room.min(n);
            kept.extend_from_slice(&buf[..take]);
            truncated |= take < n;
        }

        let size = hasher.len();
        let alg = hasher.alg();
        collector.record(uri, alg, hasher.finalize())?;
        att.complete(Bytes::from(kept), size, truncated);
        counters.add_attachment(size);
        trace!(attachment = %cid, bytes = size, truncated, "attachment bound");
    }

    if let Some(missing) = placeholders.iter().find(|a| a.state() != AttachmentState::Complete) {
        return Err(OsciError::parse(
            FaultCode::AttachmentMissing,
            format!("attachment {} declared but not present", missing.ref_id()),
        ));
    }
    debug!(attachments = placeholders.len(), "attachments bound");
    Ok(())
}
