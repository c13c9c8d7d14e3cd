//! The index built by a scan: where every recognized record starts and ends.
//!
//! Nothing in here owns buffer memory. Every [`Span`] is an absolute word offset into
//! the root buffer that was scanned, so an index is only meaningful next to that
//! buffer (see [`crate::block_parser::BlockView`]).
use bitvec::prelude::*;
use std::collections::BTreeMap;

use super::constants::ROC_STATUS_SYNC;
use super::error::ScanIssue;
use super::words::{BankHeader, BlockHeader, ContentType, SegmentHeader};

/// A range of words in the root buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub index: usize,
    pub length: usize,
}

impl Span {
    pub fn new(index: usize, length: usize) -> Self {
        Self { index, length }
    }

    /// One past the last word
    pub fn end(&self) -> usize {
        self.index + self.length
    }

    pub fn contains(&self, other: &Span) -> bool {
        other.index >= self.index && other.end() <= self.end()
    }

    /// View the words of this span, or None if the span is not inside the buffer
    pub fn slice<'a>(&self, buffer: &'a [u32]) -> Option<&'a [u32]> {
        buffer.get(self.index..self.end())
    }
}

/// One triggered event inside a module block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    /// Starts at the event header word
    pub span: Span,
    pub event_number: u32,
    /// Only trigger modules (TI/TS) report an event type
    pub event_type: Option<u8>,
}

/// Everything found for one slot (module) inside a data bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotIndex {
    pub slot: u8,
    pub block_header_index: usize,
    pub block_header: BlockHeader,
    pub block_trailer_index: Option<usize>,
    pub events: Vec<EventRecord>,
}

impl SlotIndex {
    pub fn new(slot: u8, block_header_index: usize, block_header: BlockHeader) -> Self {
        Self {
            slot,
            block_header_index,
            block_header,
            block_trailer_index: None,
            events: Vec::new(),
        }
    }

    pub fn event(&self, event: usize) -> Option<&EventRecord> {
        self.events.get(event)
    }
}

/// A data bank inside a ROC bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBank {
    pub bank_id: u16,
    pub header: BankHeader,
    pub span: Span,
    /// Words were byte-swapped before interpretation by the last module scan
    pub swapped: bool,
    /// Number of events declared by the first block header, once scanned
    pub block_level: Option<u8>,
    pub slot_mask: BitArr!(for 32, in u32, Lsb0),
    pub slots: BTreeMap<u8, SlotIndex>,
}

impl DataBank {
    pub fn new(bank_id: u16, header: BankHeader, span: Span) -> Self {
        Self {
            bank_id,
            header,
            span,
            swapped: false,
            block_level: None,
            slot_mask: BitArray::ZERO,
            slots: BTreeMap::new(),
        }
    }

    pub fn content_type(&self) -> ContentType {
        self.header.content_type()
    }

    /// Bit n set for every slot n found in the bank
    pub fn slot_mask_bits(&self) -> u32 {
        self.slot_mask.as_raw_slice()[0]
    }

    /// Drop the results of a previous module scan
    pub fn reset_scan(&mut self) {
        self.swapped = false;
        self.block_level = None;
        self.slot_mask = BitArray::ZERO;
        self.slots.clear();
    }
}

/// A ROC bank inside a CODA physics event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RocBank {
    pub roc_id: u16,
    pub header: BankHeader,
    pub span: Span,
    pub banks: BTreeMap<u16, DataBank>,
}

impl RocBank {
    pub fn new(roc_id: u16, header: BankHeader, span: Span) -> Self {
        Self {
            roc_id,
            header,
            span,
            banks: BTreeMap::new(),
        }
    }

    /// The ROC flagged this block as containing a sync event
    pub fn is_sync(&self) -> bool {
        self.header.tag() & ROC_STATUS_SYNC != 0
    }

    pub fn block_level(&self) -> u8 {
        self.header.num()
    }
}

/// One segment of the trigger bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSegment {
    pub header: SegmentHeader,
    /// Payload words, excluding the segment header
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TriggerBank {
    pub tag: u16,
    /// Number of ROCs declared in the trigger bank header
    pub nrocs: u8,
    pub span: Span,
    pub timestamp: Option<TriggerSegment>,
    pub event_type: Option<TriggerSegment>,
    pub rocs: BTreeMap<u8, TriggerSegment>,
}

/// What kind of CODA event the root bank was
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodaEvent {
    Physics { tag: u16, block_level: u8 },
    Control { tag: u16 },
}

/// The complete index of one scanned buffer
#[derive(Debug, Clone, Default)]
pub struct BlockIndex {
    pub event: Option<CodaEvent>,
    pub rocs: BTreeMap<u16, RocBank>,
    pub trigger_bank: Option<TriggerBank>,
    pub issues: Vec<ScanIssue>,
}

impl BlockIndex {
    pub fn clear(&mut self) {
        self.event = None;
        self.rocs.clear();
        self.trigger_bank = None;
        self.issues.clear();
    }

    /// Log a non-fatal issue and keep it with the index
    pub fn report(&mut self, issue: ScanIssue) {
        match issue {
            ScanIssue::SlotMismatch { .. }
            | ScanIssue::WordCountMismatch { .. }
            | ScanIssue::EventCountMismatch { .. } => log::error!("{issue}"),
            _ => log::warn!("{issue}"),
        }
        self.issues.push(issue);
    }

    pub fn roc(&self, roc_id: u16) -> Option<&RocBank> {
        self.rocs.get(&roc_id)
    }

    pub fn bank(&self, roc_id: u16, bank_id: u16) -> Option<&DataBank> {
        self.roc(roc_id)?.banks.get(&bank_id)
    }

    pub fn bank_mut(&mut self, roc_id: u16, bank_id: u16) -> Option<&mut DataBank> {
        self.rocs.get_mut(&roc_id)?.banks.get_mut(&bank_id)
    }

    pub fn slot(&self, roc_id: u16, bank_id: u16, slot: u8) -> Option<&SlotIndex> {
        self.bank(roc_id, bank_id)?.slots.get(&slot)
    }

    pub fn event(&self, roc_id: u16, bank_id: u16, slot: u8, event: usize) -> Option<&EventRecord> {
        self.slot(roc_id, bank_id, slot)?.event(event)
    }

    pub fn block_level(&self) -> Option<u8> {
        match self.event {
            Some(CodaEvent::Physics { block_level, .. }) => Some(block_level),
            _ => None,
        }
    }
}
