//! Reassembly of a multi-event block into one EVIO bank per trigger.
//!
//! The front end reads modules out in blocks: one ROC bank holds, per module, the data
//! of `block level` consecutive triggers. Unblocking writes a new bank for each of
//! those triggers holding the trigger module record and every slot's slice of data
//! for that trigger only.
use super::config::{BankConfig, Config, DebugMask, Endian, Show};
use super::error::UnblockError;
use super::block_parser::BlockView;
use super::index::{EventRecord, Span};
use super::module_scan::ModuleKind;
use super::words::{swap_word, BankHeader, ContentType};

/// Length word of a bank holding `bytes` bytes (length and header words included)
/// and the number of padding bytes needed to reach the next word boundary
pub fn padded_bank_length(bytes: usize) -> (u32, usize) {
    let mut padded = bytes;
    if padded % 2 == 1 {
        padded += 1;
    }
    if padded % 4 == 2 {
        padded += 2;
    }
    ((padded / 4).saturating_sub(1) as u32, padded - bytes)
}

/// Header word of a reassembled event bank
pub fn event_bank_header(sync: bool, event_type: u16, trigger_number: u32) -> BankHeader {
    let tag = ((sync as u16) << 8) | (event_type & 0xF);
    BankHeader::new(tag, ContentType::Bank, (trigger_number & 0xFF) as u8)
}

/// Capacity-checked writer of 32-bit words into the output buffer
struct OutputWriter<'o> {
    out: &'o mut [u32],
    pos: usize,
    swap: bool,
}

impl OutputWriter<'_> {
    fn reserve(&self, words: usize) -> Result<(), UnblockError> {
        let needed = self.pos + words;
        if needed > self.out.len() {
            Err(UnblockError::BufferOverflow {
                needed,
                capacity: self.out.len(),
            })
        } else {
            Ok(())
        }
    }

    fn push(&mut self, word: u32) -> Result<(), UnblockError> {
        self.reserve(1)?;
        self.out[self.pos] = swap_word(word, self.swap);
        self.pos += 1;
        Ok(())
    }

    /// Copy words, un-swapping them from the input order first
    fn copy(&mut self, words: &[u32], input_swapped: bool) -> Result<(), UnblockError> {
        self.reserve(words.len())?;
        for (slot, word) in self.out[self.pos..self.pos + words.len()]
            .iter_mut()
            .zip(words)
        {
            *slot = swap_word(swap_word(*word, input_swapped), self.swap);
        }
        self.pos += words.len();
        Ok(())
    }

    /// Write the length placeholder and header; returns where the bank starts
    fn open_bank(&mut self, header: BankHeader) -> Result<usize, UnblockError> {
        self.reserve(2)?;
        let start = self.pos;
        self.push(0)?;
        self.push(header.0)?;
        Ok(start)
    }

    fn close_bank(&mut self, start: usize) {
        let (length, _) = padded_bank_length((self.pos - start) * 4);
        self.out[start] = swap_word(length, self.swap);
    }
}

/// Splits blocked ROC data into single-trigger events
#[derive(Debug, Clone)]
pub struct Unblocker {
    banks: Vec<BankConfig>,
    output_endian: Endian,
    debug: DebugMask,
    trigger_number: u32,
    events: Vec<Span>,
    next_event: usize,
}

impl Unblocker {
    pub fn new(banks: Vec<BankConfig>, output_endian: Endian) -> Self {
        Self {
            banks,
            output_endian,
            debug: DebugMask::default(),
            trigger_number: 1,
            events: Vec::new(),
            next_event: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut unblocker = Self::new(config.banks.clone(), config.output_endian);
        unblocker.debug = config.debug_mask();
        unblocker
    }

    /// Spans of the events written by the last unblock
    pub fn events(&self) -> &[Span] {
        &self.events
    }

    /// Hand out the events of the last unblock one at a time, wrapping around
    pub fn fill_event<'o>(&mut self, output: &'o [u32]) -> Option<&'o [u32]> {
        if self.events.is_empty() {
            return None;
        }
        let span = self.events[self.next_event];
        self.next_event = (self.next_event + 1) % self.events.len();
        if self.debug.is_set(Show::FillEvents) {
            log::debug!("Filling event at word {} ({} words)", span.index, span.length);
        }
        span.slice(output)
    }

    fn trigger_config(&self) -> Option<BankConfig> {
        self.banks.iter().find(|b| b.kind.is_trigger_module()).copied()
    }

    /// Number of triggers in the block, and the trigger module records if there is one
    fn trigger_records(&self, view: &BlockView) -> Result<(usize, Vec<EventRecord>), UnblockError> {
        match self.trigger_config() {
            Some(config) => {
                let bank = view
                    .index()
                    .bank(config.roc_id, config.bank_id)
                    .ok_or(UnblockError::MissingBank {
                        roc: config.roc_id,
                        bank: config.bank_id,
                    })?;
                let records = bank
                    .slots
                    .values()
                    .next()
                    .map(|slot| slot.events.clone())
                    .unwrap_or_default();
                Ok((records.len(), records))
            }
            None => Ok((view.event_block_level().unwrap_or(0) as usize, Vec::new())),
        }
    }

    /// Write one bank per trigger of the parsed block into `output`.
    ///
    /// Returns the number of words written. Nothing at or past `output.len()` is ever
    /// touched; running out of room fails with [`UnblockError::BufferOverflow`].
    pub fn unblock(&mut self, view: &mut BlockView, output: &mut [u32]) -> Result<usize, UnblockError> {
        self.events.clear();
        self.next_event = 0;

        for config in self.banks.iter().filter(|b| b.kind.is_blocked()) {
            if view.check_bank(config.roc_id, config.bank_id) {
                view.scan_bank(config.roc_id, config.bank_id, config.kind, config.swap)?;
            }
        }

        let (n_events, trigger_records) = self.trigger_records(view)?;
        if n_events == 0 {
            return Err(UnblockError::NoEvents);
        }
        let trigger = self.trigger_config();
        let event_types = view.trigger_bank_event_types().unwrap_or_default();
        let sync = view.is_sync();
        let buffer = view.buffer();
        let index = view.index();

        let mut writer = OutputWriter {
            out: output,
            pos: 0,
            swap: self.output_endian.needs_swap(),
        };

        for event in 0..n_events {
            let record = trigger_records.get(event);
            let event_type = record
                .and_then(|r| r.event_type)
                .map(|t| t as u16)
                .or_else(|| event_types.get(event).copied())
                .unwrap_or(0);
            let trigger_number = record
                .map(|r| r.event_number)
                .unwrap_or(self.trigger_number);
            let is_sync = sync && event + 1 == n_events;
            self.trigger_number = self.trigger_number.wrapping_add(1);

            let header = event_bank_header(is_sync, event_type, trigger_number);
            if self.debug.is_set(Show::Unblock) {
                log::debug!(
                    "Event {event}: header 0x{:08x} at word {}",
                    header.0,
                    writer.pos
                );
            }
            let event_start = writer.open_bank(header)?;

            if let (Some(config), Some(record)) = (trigger, record) {
                let words = record.span.slice(buffer).unwrap_or_default();
                let start = writer.open_bank(BankHeader::new(config.bank_id, ContentType::UInt32, 0))?;
                writer.copy(words, config.swap)?;
                writer.close_bank(start);
            }

            for config in &self.banks {
                if config.kind.is_trigger_module() {
                    continue;
                }
                let Some(bank) = index.bank(config.roc_id, config.bank_id) else {
                    if self.debug.is_set(Show::BankNotFound) {
                        log::debug!(
                            "ROC {} bank {} not in block, not unblocked",
                            config.roc_id,
                            config.bank_id
                        );
                    }
                    continue;
                };

                if config.kind.is_blocked() {
                    for (slot, entry) in &bank.slots {
                        let Some(record) = entry.event(event) else {
                            log::warn!(
                                "ROC {} bank {} slot {slot} has no event {event}, left out of that event",
                                config.roc_id,
                                config.bank_id
                            );
                            continue;
                        };
                        let words = record.span.slice(buffer).unwrap_or_default();
                        let start = writer.open_bank(BankHeader::new(
                            config.bank_id,
                            ContentType::UInt32,
                            *slot,
                        ))?;
                        writer.copy(words, config.swap)?;
                        writer.close_bank(start);
                    }
                } else if event == 0 || config.kind != (ModuleKind::Other { once: true }) {
                    let words = bank.span.slice(buffer).unwrap_or_default();
                    let start = writer.open_bank(BankHeader::new(
                        config.bank_id,
                        bank.content_type(),
                        bank.header.num(),
                    ))?;
                    writer.copy(words, config.swap)?;
                    writer.close_bank(start);
                }
            }

            writer.close_bank(event_start);
            self.events
                .push(Span::new(event_start, writer.pos - event_start));
        }

        if self.debug.is_set(Show::Unblock) {
            log::debug!("Unblocked {n_events} events into {} words", writer.pos);
        }
        Ok(writer.pos)
    }
}
