use byteorder::{ByteOrder, NativeEndian};

use super::config::{DebugMask, Show};
use super::error::ScanIssue;
use super::index::{BlockIndex, Span, TriggerBank, TriggerSegment};
use super::words::{ContentType, SegmentHeader};

/// Index the segments of the CODA trigger bank.
///
/// The trigger bank is a bank of segments. Each segment is classified by its content
/// type: 64-bit values are the timestamp (and event number) segment, 16-bit values
/// are the event type segment, and 32-bit values are a per-ROC segment keyed by the
/// segment tag. Anything else is reported and skipped using its declared length.
pub fn index_trigger_bank(
    buffer: &[u32],
    tag: u16,
    nrocs: u8,
    span: Span,
    index: &mut BlockIndex,
    debug: &DebugMask,
) {
    let mut bank = TriggerBank {
        tag,
        nrocs,
        span,
        ..Default::default()
    };

    let end = span.end().min(buffer.len());
    let mut at = span.index;
    while at < end {
        let header = SegmentHeader(buffer[at]);
        let payload = Span::new(at + 1, header.length());
        if payload.end() > end {
            index.report(ScanIssue::SegmentOverrun {
                index: at,
                length: header.length(),
            });
            break;
        }
        if debug.is_set(Show::SegmentFound) {
            log::debug!(
                "[{at:6}  0x{:08x}] SEGM {}: Length = {}, tag = 0x{:x}",
                header.0,
                header.content_type(),
                header.length(),
                header.tag()
            );
        }

        let segment = TriggerSegment {
            header,
            span: payload,
        };
        match header.content_type() {
            ContentType::ULong64 | ContentType::Long64 => bank.timestamp = Some(segment),
            ContentType::UShort16 | ContentType::Short16 => bank.event_type = Some(segment),
            ContentType::UInt32 => {
                bank.rocs.insert(header.tag(), segment);
            }
            content => index.report(ScanIssue::UnknownSegment {
                tag: header.tag(),
                content,
                index: at,
            }),
        }
        at = payload.end();
    }

    if bank.nrocs as usize != bank.rocs.len() {
        log::debug!(
            "Trigger bank declares {} ROCs, found {} ROC segments",
            bank.nrocs,
            bank.rocs.len()
        );
    }
    index.trigger_bank = Some(bank);
}

/// Reinterpret 32-bit words as the 64-bit values they were written as
pub fn decode_u64(words: &[u32]) -> Vec<u64> {
    let mut bytes = [0u8; 8];
    words
        .chunks_exact(2)
        .map(|pair| {
            NativeEndian::write_u32(&mut bytes[..4], pair[0]);
            NativeEndian::write_u32(&mut bytes[4..], pair[1]);
            NativeEndian::read_u64(&bytes)
        })
        .collect()
}

/// Reinterpret 32-bit words as 16-bit values, dropping the trailing padding
pub fn decode_u16(words: &[u32], padding_bytes: u8) -> Vec<u16> {
    let mut bytes = [0u8; 4];
    let mut values = Vec::with_capacity(words.len() * 2);
    for word in words {
        NativeEndian::write_u32(&mut bytes, *word);
        values.push(NativeEndian::read_u16(&bytes[..2]));
        values.push(NativeEndian::read_u16(&bytes[2..]));
    }
    values.truncate(values.len().saturating_sub(padding_bytes as usize / 2));
    values
}

/// Pack 16-bit values into 32-bit words the way they sit in memory, with the EVIO padding count
pub fn encode_u16(values: &[u16]) -> (Vec<u32>, u8) {
    let mut bytes = [0u8; 4];
    let words = values
        .chunks(2)
        .map(|pair| {
            NativeEndian::write_u16(&mut bytes[..2], pair[0]);
            NativeEndian::write_u16(&mut bytes[2..], pair.get(1).copied().unwrap_or(0));
            NativeEndian::read_u32(&bytes)
        })
        .collect();
    let padding = if values.len() % 2 == 1 { 2 } else { 0 };
    (words, padding)
}

/// Split 64-bit values into 32-bit words the way they sit in memory
pub fn encode_u64(values: &[u64]) -> Vec<u32> {
    let mut bytes = [0u8; 8];
    let mut words = Vec::with_capacity(values.len() * 2);
    for value in values {
        NativeEndian::write_u64(&mut bytes, *value);
        words.push(NativeEndian::read_u32(&bytes[..4]));
        words.push(NativeEndian::read_u32(&bytes[4..]));
    }
    words
}
