//! Slot and event sub-indexing of module data banks.
//!
//! A data bank holds one or more blocks of JLab-format module data, one block per slot.
//! Each block opens with a block header, holds a number of events and closes with a
//! block trailer. Scanning a bank records, for every slot, where its block header and
//! trailer sit and the span of every event inside the block.
//!
//! Event lengths are only known once the next boundary is seen, so each scanner keeps
//! a single open event which is closed by the next event header, the block trailer, a
//! new block header, or the end of the bank.
use serde::{Deserialize, Serialize};

use super::config::{DebugMask, Show};
use super::error::{ModuleScanError, ScanIssue};
use super::index::{DataBank, EventRecord, SlotIndex, Span};
use super::words::{
    swap_word, BlockHeader, BlockTrailer, DataType, DataWord, EventHeader, ModuleId,
    ScalerHeader, TriggerEventHeader, TriggerHeader2,
};

/// What kind of module wrote a bank, which decides how (and if) it is scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleKind {
    Ti,
    Ts,
    Fadc250,
    Generic,
    /// Not blocked module data. Copied whole when unblocking, into every event or only the first.
    Other { once: bool },
}

impl ModuleKind {
    pub fn scanner(&self) -> Option<&'static dyn ModuleScanner> {
        match self {
            Self::Ti | Self::Ts => Some(&TriggerModuleScanner),
            Self::Fadc250 | Self::Generic => Some(&JLabScanner),
            Self::Other { .. } => None,
        }
    }

    pub fn is_trigger_module(&self) -> bool {
        matches!(self, Self::Ti | Self::Ts)
    }

    /// Data arrives in blocks of events that can be split per trigger
    pub fn is_blocked(&self) -> bool {
        !matches!(self, Self::Other { .. })
    }
}

/// Everything a scanner gets to see besides the bank it fills
#[derive(Debug, Clone, Copy)]
pub struct ScanInput<'a> {
    pub roc: u16,
    pub buffer: &'a [u32],
    pub swap: bool,
    pub debug: &'a DebugMask,
}

pub trait ModuleScanner {
    /// Fill the slot index of `bank`. Returns the number of events declared by the
    /// first block header, or 0 if there was none.
    fn scan(
        &self,
        input: &ScanInput,
        bank: &mut DataBank,
        issues: &mut Vec<ScanIssue>,
    ) -> Result<u8, ModuleScanError>;
}

/// Block bookkeeping shared by all scanners
struct BlockTracker<'i> {
    roc: u16,
    bank_id: u16,
    first_block_level: Option<u8>,
    /// Events decoded in the first block, which every later block must match
    first_block_events: Option<usize>,
    n_blocks: usize,
    /// Slot and word index of the most recent block header
    current: Option<(u8, usize)>,
    /// The block at `current` has not yet been closed and counted
    block_open: bool,
    last_module: Option<ModuleId>,
    issues: &'i mut Vec<ScanIssue>,
}

impl<'i> BlockTracker<'i> {
    fn new(roc: u16, bank_id: u16, issues: &'i mut Vec<ScanIssue>) -> Self {
        Self {
            roc,
            bank_id,
            first_block_level: None,
            first_block_events: None,
            n_blocks: 0,
            current: None,
            block_open: false,
            last_module: None,
            issues,
        }
    }

    /// Compare the events decoded in the open block with the first block's
    fn close_block(&mut self, bank: &DataBank) {
        if !self.block_open {
            return;
        }
        self.block_open = false;
        let Some((slot, _)) = self.current else {
            return;
        };
        let count = bank.slots.get(&slot).map(|s| s.events.len()).unwrap_or(0);
        match self.first_block_events {
            None => self.first_block_events = Some(count),
            Some(first) if first != count => self.issues.push(ScanIssue::EventCountMismatch {
                roc: self.roc,
                bank: self.bank_id,
                block: self.n_blocks - 1,
                count,
                first,
            }),
            Some(_) => (),
        }
    }

    fn block_header(&mut self, bank: &mut DataBank, at: usize, header: BlockHeader) {
        self.close_block(bank);
        let slot = header.slot_number();
        if self.first_block_level.is_none() {
            self.first_block_level = Some(header.number_of_events_in_block());
        }
        self.n_blocks += 1;
        self.current = Some((slot, at));
        self.block_open = true;
        self.last_module = Some(header.module_id());
        bank.slot_mask.set(slot as usize, true);
        bank.slots.insert(slot, SlotIndex::new(slot, at, header));
    }

    fn block_trailer(&mut self, bank: &mut DataBank, at: usize, trailer: BlockTrailer) {
        let Some((slot, start)) = self.current else {
            log::debug!(
                "ROC {} bank {}: block trailer at word {at} without a block header",
                self.roc,
                self.bank_id
            );
            return;
        };
        self.close_block(bank);
        if trailer.slot_number() != slot {
            self.issues.push(ScanIssue::SlotMismatch {
                roc: self.roc,
                bank: self.bank_id,
                header_slot: slot,
                trailer_slot: trailer.slot_number(),
                index: at,
            });
        }
        let counted = at - start + 1;
        if trailer.words_in_block() != counted {
            self.issues.push(ScanIssue::WordCountMismatch {
                roc: self.roc,
                bank: self.bank_id,
                declared: trailer.words_in_block(),
                counted,
                index: at,
            });
        }
        if let Some(entry) = bank.slots.get_mut(&slot) {
            entry.block_trailer_index = Some(at);
        }
    }

    fn finish(mut self, bank: &mut DataBank) -> u8 {
        self.close_block(bank);
        bank.block_level = self.first_block_level;
        self.first_block_level.unwrap_or(0)
    }
}

/// Close the event opened at (slot, start), ending it just before `at`
fn close_event(bank: &mut DataBank, open: &mut Option<(u8, usize)>, at: usize) {
    if let Some((slot, start)) = open.take() {
        if let Some(event) = bank.slots.get_mut(&slot).and_then(|s| s.events.last_mut()) {
            event.span.length = at - start;
        }
    }
}

fn bank_words<'a>(input: &ScanInput<'a>, bank: &DataBank) -> &'a [u32] {
    bank.span.slice(input.buffer).unwrap_or_default()
}

/// Scanner for modules following the JLab data format standard (FADC250 and friends)
#[derive(Debug, Clone, Copy, Default)]
pub struct JLabScanner;

impl ModuleScanner for JLabScanner {
    fn scan(
        &self,
        input: &ScanInput,
        bank: &mut DataBank,
        issues: &mut Vec<ScanIssue>,
    ) -> Result<u8, ModuleScanError> {
        bank.reset_scan();
        bank.swapped = input.swap;
        let words = bank_words(input, bank);
        let offset = bank.span.index;
        let debug = input.debug;
        let mut tracker = BlockTracker::new(input.roc, bank.bank_id, issues);
        let mut open: Option<(u8, usize)> = None;

        let mut i = 0;
        while i < words.len() {
            let at = offset + i;
            let word = swap_word(words[i], input.swap);
            match DataWord(word).data_type() {
                Some(DataType::BlockHeader) => {
                    close_event(bank, &mut open, at);
                    let header = BlockHeader(word);
                    if debug.is_set(Show::BlockHeader) {
                        log::debug!(
                            "[{at:6}  0x{word:08x}] BLOCK HEADER: slot = {}, block number = {}, events = {}",
                            header.slot_number(),
                            header.event_block_number(),
                            header.number_of_events_in_block()
                        );
                    }
                    tracker.block_header(bank, at, header);
                }
                Some(DataType::EventHeader) => {
                    let Some((slot, _)) = tracker.current else {
                        return Err(ModuleScanError::EventHeaderWithoutSlot {
                            roc: input.roc,
                            bank: bank.bank_id,
                            index: at,
                        });
                    };
                    close_event(bank, &mut open, at);
                    let header = EventHeader(word);
                    if debug.is_set(Show::EventHeader) {
                        log::debug!(
                            "[{at:6}  0x{word:08x}] EVENT HEADER: slot = {slot}, event number = {}",
                            header.event_number()
                        );
                    }
                    if let Some(entry) = bank.slots.get_mut(&slot) {
                        entry.events.push(EventRecord {
                            span: Span::new(at, 0),
                            event_number: header.event_number(),
                            event_type: None,
                        });
                        open = Some((slot, at));
                    }
                }
                Some(DataType::BlockTrailer) => {
                    close_event(bank, &mut open, at);
                    let trailer = BlockTrailer(word);
                    if debug.is_set(Show::BlockTrailer) {
                        log::debug!(
                            "[{at:6}  0x{word:08x}] BLOCK TRAILER: slot = {}, words = {}",
                            trailer.slot_number(),
                            trailer.words_in_block()
                        );
                    }
                    tracker.block_trailer(bank, at, trailer);
                }
                Some(DataType::ScalerHeader) if tracker.last_module == Some(ModuleId::Fa250) => {
                    let n_scalers = ScalerHeader(word).number_scaler_words();
                    if debug.is_set(Show::Other) {
                        log::debug!("[{at:6}  0x{word:08x}] SCALER HEADER: {n_scalers} words");
                    }
                    i += n_scalers;
                }
                Some(DataType::TriggerTime) => {
                    if debug.is_set(Show::EventTimestamp) {
                        log::debug!("[{at:6}  0x{word:08x}] TRIGGER TIME");
                    }
                }
                _ => {
                    if debug.is_set(Show::Other) {
                        log::debug!("[{at:6}  0x{word:08x}]");
                    }
                }
            }
            i += 1;
        }
        close_event(bank, &mut open, offset + words.len());

        Ok(tracker.finish(bank))
    }
}

/// Scanner for the TI/TS trigger modules.
///
/// Their blocks carry a second header word (number of events, timestamp flag) and then
/// one counted record per event: a record header with the event type and word count,
/// the event number, and optionally timestamp words.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerModuleScanner;

impl ModuleScanner for TriggerModuleScanner {
    fn scan(
        &self,
        input: &ScanInput,
        bank: &mut DataBank,
        issues: &mut Vec<ScanIssue>,
    ) -> Result<u8, ModuleScanError> {
        bank.reset_scan();
        bank.swapped = input.swap;
        let words = bank_words(input, bank);
        let offset = bank.span.index;
        let debug = input.debug;
        let mut pending = Vec::new();
        let mut tracker = BlockTracker::new(input.roc, bank.bank_id, issues);

        let mut i = 0;
        while i < words.len() {
            let at = offset + i;
            let word = swap_word(words[i], input.swap);
            match DataWord(word).data_type() {
                Some(DataType::BlockHeader) => {
                    let header = BlockHeader(word);
                    tracker.block_header(bank, at, header);
                    let slot = header.slot_number();

                    let header2 = words
                        .get(i + 1)
                        .map(|w| TriggerHeader2(swap_word(*w, input.swap)));
                    let header2 = match header2 {
                        Some(h) if h.is_valid() => h,
                        other => {
                            pending.push(ScanIssue::TriggerHeaderMissing {
                                roc: input.roc,
                                bank: bank.bank_id,
                                index: at + 1,
                                word: other.map(|h| h.0).unwrap_or(0),
                            });
                            i += 1;
                            continue;
                        }
                    };
                    if debug.is_set(Show::BlockHeader) {
                        log::debug!(
                            "[{at:6}  0x{word:08x}] TRIGGER BLOCK HEADER: slot = {slot}, events = {}, timestamp = {}",
                            header2.number_of_events(),
                            header2.has_timestamp()
                        );
                    }

                    i += 2;
                    for _ in 0..header2.number_of_events() {
                        let Some(raw) = words.get(i) else {
                            pending.push(ScanIssue::TriggerRecordOverrun {
                                roc: input.roc,
                                bank: bank.bank_id,
                                index: offset + i,
                            });
                            break;
                        };
                        let record = TriggerEventHeader(swap_word(*raw, input.swap));
                        let end = i + 1 + record.word_count();
                        if end > words.len() {
                            pending.push(ScanIssue::TriggerRecordOverrun {
                                roc: input.roc,
                                bank: bank.bank_id,
                                index: offset + i,
                            });
                            i = words.len();
                            break;
                        }
                        let event_number = if record.word_count() > 0 {
                            swap_word(words[i + 1], input.swap)
                        } else {
                            0
                        };
                        if debug.is_set(Show::EventHeader) {
                            log::debug!(
                                "[{:6}  0x{:08x}] TRIGGER EVENT: type = 0x{:02x}, number = {event_number}",
                                offset + i,
                                record.0,
                                record.event_type()
                            );
                        }
                        if let Some(entry) = bank.slots.get_mut(&slot) {
                            entry.events.push(EventRecord {
                                span: Span::new(offset + i, 1 + record.word_count()),
                                event_number,
                                event_type: Some(record.event_type()),
                            });
                        }
                        i = end;
                    }
                    continue;
                }
                Some(DataType::BlockTrailer) => {
                    let trailer = BlockTrailer(word);
                    if debug.is_set(Show::BlockTrailer) {
                        log::debug!(
                            "[{at:6}  0x{word:08x}] TRIGGER BLOCK TRAILER: slot = {}, words = {}",
                            trailer.slot_number(),
                            trailer.words_in_block()
                        );
                    }
                    tracker.block_trailer(bank, at, trailer);
                }
                _ => {
                    if debug.is_set(Show::Other) {
                        log::debug!("[{at:6}  0x{word:08x}]");
                    }
                }
            }
            i += 1;
        }

        let level = tracker.finish(bank);
        issues.append(&mut pending);
        Ok(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{jlab_block, ti_block};
    use crate::words::{BankHeader, ContentType};

    fn bank_over(buffer: &[u32]) -> DataBank {
        DataBank::new(
            3,
            BankHeader::new(3, ContentType::UInt32, 0),
            Span::new(0, buffer.len()),
        )
    }

    fn scan(
        kind: ModuleKind,
        buffer: &[u32],
        swap: bool,
    ) -> (Result<u8, ModuleScanError>, DataBank, Vec<ScanIssue>) {
        let debug = DebugMask::default();
        let input = ScanInput {
            roc: 1,
            buffer,
            swap,
            debug: &debug,
        };
        let mut bank = bank_over(buffer);
        let mut issues = Vec::new();
        let result = kind
            .scanner()
            .unwrap()
            .scan(&input, &mut bank, &mut issues);
        (result, bank, issues)
    }

    #[test]
    fn test_slot_five_block_level_three() {
        let buffer = jlab_block(5, 1, 1, &[&[0x1111], &[0x2222, 0x3333], &[]]);
        let (result, bank, issues) = scan(ModuleKind::Fadc250, &buffer, false);
        assert_eq!(result, Ok(3));
        assert!(issues.is_empty());
        assert_eq!(bank.block_level, Some(3));
        assert_eq!(bank.slot_mask_bits(), 1 << 5);

        let slot = &bank.slots[&5];
        assert_eq!(slot.block_header_index, 0);
        assert_eq!(slot.block_trailer_index, Some(7));
        let spans: Vec<Span> = slot.events.iter().map(|e| e.span).collect();
        assert_eq!(spans, vec![Span::new(1, 2), Span::new(3, 3), Span::new(6, 1)]);
        assert_eq!(slot.events[1].event_number, 2);
        assert_eq!(spans[1].slice(&buffer), Some(&buffer[3..6]));
    }

    #[test]
    fn test_swapped_bank_scans_identically() {
        let buffer = jlab_block(5, 1, 1, &[&[0x1111], &[0x2222, 0x3333], &[]]);
        let swapped: Vec<u32> = buffer.iter().map(|w| w.swap_bytes()).collect();
        let (_, native, _) = scan(ModuleKind::Generic, &buffer, false);
        let (result, other, issues) = scan(ModuleKind::Generic, &swapped, true);
        assert_eq!(result, Ok(3));
        assert!(issues.is_empty());
        assert!(other.swapped);
        assert_eq!(native.slots, other.slots);
    }

    #[test]
    fn test_end_of_bank_closes_open_event() {
        let mut buffer = jlab_block(3, 1, 1, &[&[0xA], &[0xB, 0xC]]);
        buffer.pop();
        let (result, bank, _) = scan(ModuleKind::Generic, &buffer, false);
        assert_eq!(result, Ok(2));
        let slot = &bank.slots[&3];
        assert_eq!(slot.block_trailer_index, None);
        assert_eq!(slot.events[1].span, Span::new(3, 3));
    }

    #[test]
    fn test_event_header_without_block_header() {
        let buffer = vec![EventHeader::new(3, 1).0, 5];
        let (result, _, _) = scan(ModuleKind::Generic, &buffer, false);
        assert_eq!(
            result,
            Err(ModuleScanError::EventHeaderWithoutSlot {
                roc: 1,
                bank: 3,
                index: 0
            })
        );
    }

    #[test]
    fn test_block_consistency_issues() {
        let mut buffer = jlab_block(3, 1, 1, &[&[0xA], &[0xB], &[0xC]]);
        let mut second = jlab_block(4, 1, 1, &[&[0xD], &[0xE]]);
        // Wrong slot and word count in the second trailer
        let last = second.len() - 1;
        second[last] = BlockTrailer::new(6, 99).0;
        buffer.extend(second);

        let (result, bank, issues) = scan(ModuleKind::Generic, &buffer, false);
        assert_eq!(result, Ok(3));
        assert_eq!(bank.slot_mask_bits(), (1 << 3) | (1 << 4));
        assert_eq!(issues.len(), 3);
        assert!(matches!(
            issues[0],
            ScanIssue::EventCountMismatch { block: 1, count: 2, first: 3, .. }
        ));
        assert!(matches!(
            issues[1],
            ScanIssue::SlotMismatch { header_slot: 4, trailer_slot: 6, .. }
        ));
        assert!(matches!(
            issues[2],
            ScanIssue::WordCountMismatch { declared: 99, counted: 6, .. }
        ));
    }

    #[test]
    fn test_decoded_event_count_must_match_first_block() {
        let mut buffer = jlab_block(3, 1, 1, &[&[0xA], &[0xB]]);
        // Declares two events like the first block, but only one follows
        let mut second = jlab_block(4, 1, 1, &[&[0xD]]);
        second[0] = BlockHeader::new(4, 1, 1, 2).0;
        buffer.extend(second);

        let (result, bank, issues) = scan(ModuleKind::Generic, &buffer, false);
        assert_eq!(result, Ok(2));
        assert_eq!(bank.slots[&3].events.len(), 2);
        assert_eq!(bank.slots[&4].events.len(), 1);
        assert_eq!(
            issues,
            vec![ScanIssue::EventCountMismatch {
                roc: 1,
                bank: 3,
                block: 1,
                count: 1,
                first: 2,
            }]
        );
    }

    #[test]
    fn test_unterminated_last_block_is_counted() {
        let mut buffer = jlab_block(3, 1, 1, &[&[0xA], &[0xB]]);
        let mut second = jlab_block(4, 1, 1, &[&[0xD], &[0xE], &[0xF]]);
        second.pop();
        buffer.extend(second);

        let (_, _, issues) = scan(ModuleKind::Generic, &buffer, false);
        assert!(matches!(
            issues[..],
            [ScanIssue::EventCountMismatch { block: 1, count: 3, first: 2, .. }]
        ));
    }

    #[test]
    fn test_fadc250_scaler_words_are_skipped() {
        let fake = BlockHeader::new(9, 1, 1, 1).0;
        let data = [ScalerHeader::new(2).0, fake, fake];
        let buffer = jlab_block(3, 1, 1, &[&data]);
        let (_, bank, issues) = scan(ModuleKind::Fadc250, &buffer, false);
        assert!(issues.is_empty());
        assert_eq!(bank.slots.keys().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(bank.slots[&3].events[0].span, Span::new(1, 4));

        // Another module id does not get the scaler treatment
        let buffer = jlab_block(3, 2, 1, &[&data]);
        let (_, bank, _) = scan(ModuleKind::Generic, &buffer, false);
        assert!(bank.slots.contains_key(&9));
    }

    #[test]
    fn test_trigger_module_records() {
        let buffer = ti_block(21, 1, &[(0x81, 10, &[0xAAAA]), (0x82, 11, &[0xBBBB])]);
        let (result, bank, issues) = scan(ModuleKind::Ti, &buffer, false);
        assert_eq!(result, Ok(2));
        assert!(issues.is_empty());
        let slot = &bank.slots[&21];
        assert_eq!(slot.block_trailer_index, Some(8));
        assert_eq!(slot.events.len(), 2);
        assert_eq!(slot.events[0].span, Span::new(2, 3));
        assert_eq!(slot.events[0].event_type, Some(0x81));
        assert_eq!(slot.events[0].event_number, 10);
        assert_eq!(slot.events[1].span, Span::new(5, 3));
        assert_eq!(slot.events[1].event_number, 11);
    }

    #[test]
    fn test_trigger_module_without_second_header() {
        let mut buffer = ti_block(21, 1, &[(0x81, 10, &[])]);
        buffer[1] = 0x1234;
        let (result, bank, issues) = scan(ModuleKind::Ts, &buffer, false);
        assert_eq!(result, Ok(1));
        assert!(bank.slots[&21].events.is_empty());
        assert!(issues.iter().any(|i| matches!(
            i,
            ScanIssue::TriggerHeaderMissing { index: 1, word: 0x1234, .. }
        )));
    }

    #[test]
    fn test_other_banks_have_no_scanner() {
        assert!(ModuleKind::Other { once: true }.scanner().is_none());
        assert!(!ModuleKind::Other { once: false }.is_blocked());
        assert!(ModuleKind::Ts.is_trigger_module());
    }
}
