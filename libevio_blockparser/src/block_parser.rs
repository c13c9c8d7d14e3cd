//! The bank indexer and the lookups built on top of it.
//!
//! [`BlockParser::parse`] walks one CODA event buffer and records where the ROC banks,
//! their data banks and the trigger bank sit. The result is a [`BlockView`], which
//! borrows both the parser's index and the buffer, so the index can never be read
//! against a buffer it was not built from.
use fxhash::FxHashMap;

use super::config::{BankConfig, Config, DebugMask, Show};
use super::constants::ROC_ID_MASK;
use super::error::{ModuleScanError, ScanIssue, WalkError};
use super::evio_stream::{walk, AncestorStack, Node, NodeHandler, Visit};
use super::index::{BlockIndex, CodaEvent, DataBank, RocBank};
use super::module_scan::{ModuleKind, ScanInput};
use super::tag_range::{control_event_name, TagClass};
use super::trigger_bank::{decode_u16, decode_u64, index_trigger_bank};
use super::words::{swap_word, BankHeader, BlockHeader, BlockTrailer, ContainerKind};

/// Owns the index of the most recently parsed buffer
#[derive(Debug, Default)]
pub struct BlockParser {
    index: BlockIndex,
    banks: FxHashMap<(u16, u16), BankConfig>,
    ignore_undefined_banks: bool,
    debug: DebugMask,
}

impl BlockParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            index: BlockIndex::default(),
            banks: config.bank_map(),
            ignore_undefined_banks: config.ignore_undefined_banks,
            debug: config.debug_mask(),
        }
    }

    pub fn with_debug(mut self, debug: DebugMask) -> Self {
        self.debug = debug;
        self
    }

    /// Index one CODA event. Any previous index is dropped first.
    ///
    /// Parsing never fails: framing and classification problems are logged and kept
    /// as issues on the view, and everything that could be indexed is.
    pub fn parse<'p, 'b>(&'p mut self, buffer: &'b [u32]) -> BlockView<'p, 'b> {
        self.index.clear();
        let mut builder = IndexBuilder {
            index: &mut self.index,
            banks: &self.banks,
            ignore_undefined_banks: self.ignore_undefined_banks,
            debug: &self.debug,
            buffer,
        };
        if let Err(e) = walk(buffer, &mut builder) {
            builder.index.report(ScanIssue::Framing(e));
        }

        BlockView {
            index: &mut self.index,
            banks: &self.banks,
            debug: &self.debug,
            buffer,
        }
    }
}

/// Classifies every node handed over by the walker and fills the index
struct IndexBuilder<'a> {
    index: &'a mut BlockIndex,
    banks: &'a FxHashMap<(u16, u16), BankConfig>,
    ignore_undefined_banks: bool,
    debug: &'a DebugMask,
    buffer: &'a [u32],
}

impl IndexBuilder<'_> {
    fn bank_header(&self, node: &Node) -> BankHeader {
        match node.kind {
            ContainerKind::Bank => BankHeader(self.buffer[node.header_index + 1]),
            _ => BankHeader::new(node.tag, node.content, node.num),
        }
    }

    /// Classify the CODA event bank. Only physics events are descended into.
    fn root_node(&mut self, node: &Node) -> Visit {
        match TagClass::classify(node.tag) {
            TagClass::PhysicsEvent if node.content.is_container() => {
                self.index.event = Some(CodaEvent::Physics {
                    tag: node.tag,
                    block_level: node.num,
                });
                Visit::Descend
            }
            TagClass::ControlEvent => {
                log::info!(
                    "Control event 0x{:04x} ({})",
                    node.tag,
                    control_event_name(node.tag).unwrap_or("user")
                );
                self.index.event = Some(CodaEvent::Control { tag: node.tag });
                Visit::Skip
            }
            _ => {
                self.index.report(ScanIssue::UnknownEventTag(node.tag));
                Visit::Skip
            }
        }
    }

    fn add_data_bank(&mut self, node: &Node, ancestors: &AncestorStack) {
        let Some(roc_id) = ancestors.at(1).map(|roc| roc.tag & ROC_ID_MASK) else {
            self.index.report(ScanIssue::OrphanLeaf {
                tag: node.tag,
                content: node.content,
                depth: node.depth,
            });
            return;
        };
        if self.ignore_undefined_banks && !self.banks.contains_key(&(roc_id, node.tag)) {
            if self.debug.is_set(Show::IgnoredBanks) {
                log::debug!("Ignoring undefined bank {} in ROC {roc_id}", node.tag);
            }
            return;
        }

        let header = self.bank_header(node);
        if self.debug.is_set(Show::BankFound) {
            log::debug!(
                "[{:6}] ROC {roc_id} BANK {}: content = {}, length = {}",
                node.header_index,
                node.tag,
                node.content,
                node.payload.length
            );
        }
        match self.index.rocs.get_mut(&roc_id) {
            Some(roc) => {
                roc.banks
                    .insert(node.tag, DataBank::new(node.tag, header, node.payload));
            }
            None => log::warn!("Bank {} found for unindexed ROC {roc_id}", node.tag),
        }
    }
}

impl NodeHandler for IndexBuilder<'_> {
    fn container_node(&mut self, node: &Node, ancestors: &AncestorStack) -> Visit {
        if node.depth == 0 {
            return self.root_node(node);
        }

        match (node.depth, node.content.container_kind()) {
            (1, Some(ContainerKind::Segment)) => {
                if TagClass::classify(node.tag) != TagClass::TriggerBank {
                    log::warn!(
                        "Trigger bank tag 0x{:04x} at word {} is outside the trigger bank range",
                        node.tag,
                        node.header_index
                    );
                }
                if self.debug.is_set(Show::BankFound) {
                    log::debug!(
                        "[{:6}] TRIGGER BANK 0x{:04x}: nrocs = {}",
                        node.header_index,
                        node.tag,
                        node.num
                    );
                }
                index_trigger_bank(
                    self.buffer,
                    node.tag,
                    node.num,
                    node.payload,
                    self.index,
                    self.debug,
                );
                Visit::Skip
            }
            (1, Some(ContainerKind::Bank)) if node.kind == ContainerKind::Bank => {
                let roc_id = node.tag & ROC_ID_MASK;
                if self.debug.is_set(Show::BankFound) {
                    log::debug!(
                        "[{:6}] ROC {roc_id}: tag = 0x{:04x}, block level = {}",
                        node.header_index,
                        node.tag,
                        node.num
                    );
                }
                let roc = RocBank::new(roc_id, self.bank_header(node), node.payload);
                self.index.rocs.insert(roc_id, roc);
                Visit::Descend
            }
            (depth, _) if depth > 1 => {
                self.add_data_bank(node, ancestors);
                Visit::Descend
            }
            _ => {
                self.index.report(ScanIssue::UnexpectedContainer {
                    tag: node.tag,
                    content: node.content,
                    depth: node.depth,
                });
                Visit::Skip
            }
        }
    }

    fn leaf_node(&mut self, node: &Node, ancestors: &AncestorStack) {
        if node.depth == 0 {
            self.root_node(node);
            return;
        }
        if node.depth < 2 {
            self.index.report(ScanIssue::OrphanLeaf {
                tag: node.tag,
                content: node.content,
                depth: node.depth,
            });
            return;
        }
        self.add_data_bank(node, ancestors);
    }

    fn walk_error(&mut self, error: WalkError) {
        self.index.report(ScanIssue::Framing(error));
    }
}

/// The index of one parsed buffer, next to the buffer itself
#[derive(Debug)]
pub struct BlockView<'p, 'b> {
    index: &'p mut BlockIndex,
    banks: &'p FxHashMap<(u16, u16), BankConfig>,
    debug: &'p DebugMask,
    buffer: &'b [u32],
}

impl<'b> BlockView<'_, 'b> {
    pub fn buffer(&self) -> &'b [u32] {
        self.buffer
    }

    pub fn index(&self) -> &BlockIndex {
        &*self.index
    }

    /// Everything non-fatal that was found while parsing and scanning
    pub fn issues(&self) -> &[ScanIssue] {
        &self.index.issues
    }

    pub fn event(&self) -> Option<CodaEvent> {
        self.index.event
    }

    pub fn is_physics_event(&self) -> bool {
        matches!(self.index.event, Some(CodaEvent::Physics { .. }))
    }

    /// Block level declared by the physics event bank
    pub fn event_block_level(&self) -> Option<u8> {
        self.index.block_level()
    }

    /// Any ROC flagged this block as holding a sync event
    pub fn is_sync(&self) -> bool {
        self.index.rocs.values().any(|roc| roc.is_sync())
    }

    pub fn check_roc(&self, roc: u16) -> bool {
        self.index.roc(roc).is_some()
    }

    pub fn check_bank(&self, roc: u16, bank: u16) -> bool {
        self.index.bank(roc, bank).is_some()
    }

    pub fn check_slot(&self, roc: u16, bank: u16, slot: u8) -> bool {
        self.index.slot(roc, bank, slot).is_some()
    }

    pub fn check_event(&self, roc: u16, bank: u16, slot: u8, event: usize) -> bool {
        self.index.event(roc, bank, slot, event).is_some()
    }

    /// Payload of a 32-bit data bank
    pub fn get_u32(&self, roc: u16, bank: u16) -> Option<&'b [u32]> {
        let bank = self.index.bank(roc, bank)?;
        if !bank.content_type().is_word32() {
            return None;
        }
        bank.span.slice(self.buffer)
    }

    /// Words of one event of one slot, starting at its event header
    pub fn get_u32_event(&self, roc: u16, bank: u16, slot: u8, event: usize) -> Option<&'b [u32]> {
        self.index
            .event(roc, bank, slot, event)?
            .span
            .slice(self.buffer)
    }

    /// Payload of a 16-bit data bank
    pub fn get_u16(&self, roc: u16, bank: u16) -> Option<Vec<u16>> {
        let bank = self.index.bank(roc, bank)?;
        if !bank.content_type().is_short16() {
            return None;
        }
        Some(decode_u16(bank.span.slice(self.buffer)?, bank.header.padding()))
    }

    pub fn roc_list(&self) -> Vec<u16> {
        self.index.rocs.keys().copied().collect()
    }

    pub fn bank_list(&self, roc: u16) -> Vec<u16> {
        self.index
            .roc(roc)
            .map(|r| r.banks.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn slot_list(&self, roc: u16, bank: u16) -> Vec<u8> {
        self.index
            .bank(roc, bank)
            .map(|b| b.slots.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn slot_mask(&self, roc: u16, bank: u16) -> Option<u32> {
        self.index.bank(roc, bank).map(|b| b.slot_mask_bits())
    }

    /// Events per block declared by the first block header of a scanned bank
    pub fn block_level(&self, roc: u16, bank: u16) -> Option<u8> {
        self.index.bank(roc, bank)?.block_level
    }

    pub fn slot_block_header(&self, roc: u16, bank: u16, slot: u8) -> Option<BlockHeader> {
        self.index.slot(roc, bank, slot).map(|s| s.block_header)
    }

    pub fn slot_block_trailer(&self, roc: u16, bank: u16, slot: u8) -> Option<BlockTrailer> {
        let swap = self.index.bank(roc, bank)?.swapped;
        let at = self.index.slot(roc, bank, slot)?.block_trailer_index?;
        self.buffer
            .get(at)
            .map(|w| BlockTrailer(swap_word(*w, swap)))
    }

    /// The first word of an event record (event header, or trigger record header)
    pub fn slot_event_header(&self, roc: u16, bank: u16, slot: u8, event: usize) -> Option<u32> {
        let swap = self.index.bank(roc, bank)?.swapped;
        let record = self.index.event(roc, bank, slot, event)?;
        self.buffer
            .get(record.span.index)
            .map(|w| swap_word(*w, swap))
    }

    pub fn trigger_bank_tag(&self) -> Option<u16> {
        self.index.trigger_bank.as_ref().map(|t| t.tag)
    }

    pub fn trigger_bank_nrocs(&self) -> Option<u8> {
        self.index.trigger_bank.as_ref().map(|t| t.nrocs)
    }

    pub fn trigger_bank_timestamps(&self) -> Option<Vec<u64>> {
        let segment = self.index.trigger_bank.as_ref()?.timestamp?;
        Some(decode_u64(segment.span.slice(self.buffer)?))
    }

    pub fn trigger_bank_event_types(&self) -> Option<Vec<u16>> {
        let segment = self.index.trigger_bank.as_ref()?.event_type?;
        Some(decode_u16(
            segment.span.slice(self.buffer)?,
            segment.header.padding(),
        ))
    }

    pub fn trigger_bank_roc_data(&self, roc: u8) -> Option<&'b [u32]> {
        self.index
            .trigger_bank
            .as_ref()?
            .rocs
            .get(&roc)?
            .span
            .slice(self.buffer)
    }

    pub fn check_trigger_bank_roc(&self, roc: u8) -> bool {
        self.index
            .trigger_bank
            .as_ref()
            .is_some_and(|t| t.rocs.contains_key(&roc))
    }

    /// Scan a bank of JLab-format module data. Returns the block level of its first block.
    pub fn parse_jlab_bank(&mut self, roc: u16, bank: u16, swap: bool) -> Result<u8, ModuleScanError> {
        self.scan_bank(roc, bank, ModuleKind::Generic, swap)
    }

    /// Build the slot and event index of a data bank with the scanner for `kind`
    pub fn scan_bank(
        &mut self,
        roc: u16,
        bank: u16,
        kind: ModuleKind,
        swap: bool,
    ) -> Result<u8, ModuleScanError> {
        let input = ScanInput {
            roc,
            buffer: self.buffer,
            swap,
            debug: self.debug,
        };
        let data_bank = match self.index.bank_mut(roc, bank) {
            Some(b) => b,
            None => {
                if self.debug.is_set(Show::BankNotFound) {
                    log::debug!("ROC {roc} bank {bank} not found");
                }
                return Err(ModuleScanError::BankNotFound { roc, bank });
            }
        };
        if !data_bank.content_type().is_word32() {
            return Err(ModuleScanError::NotWordData {
                roc,
                bank,
                content: data_bank.content_type(),
            });
        }
        let Some(scanner) = kind.scanner() else {
            return Ok(0);
        };

        let mut issues = Vec::new();
        let result = scanner.scan(&input, data_bank, &mut issues);
        for issue in issues {
            self.index.report(issue);
        }
        result
    }

    /// Scan every configured blocked bank present in this buffer
    pub fn scan_configured_banks(&mut self) -> Result<(), ModuleScanError> {
        let mut configs: Vec<BankConfig> = self
            .banks
            .values()
            .filter(|b| b.kind.is_blocked())
            .copied()
            .collect();
        configs.sort_by_key(|b| (b.roc_id, b.bank_id));
        for config in configs {
            if !self.check_bank(config.roc_id, config.bank_id) {
                if self.debug.is_set(Show::BankNotFound) {
                    log::debug!(
                        "Configured ROC {} bank {} not in this block",
                        config.roc_id,
                        config.bank_id
                    );
                }
                continue;
            }
            self.scan_bank(config.roc_id, config.bank_id, config.kind, config.swap)?;
        }
        Ok(())
    }
}
