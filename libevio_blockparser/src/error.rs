use std::path::PathBuf;
use thiserror::Error;

use super::constants::MAX_NODE_DEPTH;
use super::words::ContentType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    #[error("EVIO buffer is too short to hold a bank header")]
    EmptyBuffer,
    #[error("Container at word {index} declares {length} words but only {available} remain in its parent")]
    Overrun {
        index: usize,
        length: usize,
        available: usize,
    },
    #[error("Container at word {0} is nested deeper than {max} levels", max=MAX_NODE_DEPTH)]
    TooDeep(usize),
}

/// Non-fatal findings made while indexing a buffer.
///
/// These are logged as they are found and collected in the index; they never abort
/// the scan. Whatever could be indexed around them stays available.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanIssue {
    #[error("Unknown CODA event tag 0x{0:04x} at depth 0")]
    UnknownEventTag(u16),
    #[error("Unexpected container node (tag 0x{tag:04x}, content {content}) at depth {depth}")]
    UnexpectedContainer {
        tag: u16,
        content: ContentType,
        depth: usize,
    },
    #[error("Leaf node (tag 0x{tag:04x}, content {content}) at depth {depth} has no ROC bank above it")]
    OrphanLeaf {
        tag: u16,
        content: ContentType,
        depth: usize,
    },
    #[error("Unexpected segment content {content} (tag {tag}) in trigger bank at word {index}")]
    UnknownSegment {
        tag: u8,
        content: ContentType,
        index: usize,
    },
    #[error("Trigger bank segment at word {index} declares {length} words and overruns the trigger bank")]
    SegmentOverrun { index: usize, length: usize },
    #[error("Malformed EVIO framing: {0}")]
    Framing(#[from] WalkError),
    #[error("ROC {roc} bank {bank}: block header slot {header_slot} != block trailer slot {trailer_slot} at word {index}")]
    SlotMismatch {
        roc: u16,
        bank: u16,
        header_slot: u8,
        trailer_slot: u8,
        index: usize,
    },
    #[error("ROC {roc} bank {bank}: trailer #words {declared} != actual #words {counted} at word {index}")]
    WordCountMismatch {
        roc: u16,
        bank: u16,
        declared: usize,
        counted: usize,
        index: usize,
    },
    #[error("ROC {roc} bank {bank}: event count of block {block} ({count}) != event count of block 0 ({first})")]
    EventCountMismatch {
        roc: u16,
        bank: u16,
        block: usize,
        count: usize,
        first: usize,
    },
    #[error("ROC {roc} bank {bank}: expected a trigger module header at word {index}, found 0x{word:08x}")]
    TriggerHeaderMissing {
        roc: u16,
        bank: u16,
        index: usize,
        word: u32,
    },
    #[error("ROC {roc} bank {bank}: trigger event record at word {index} overruns the bank")]
    TriggerRecordOverrun { roc: u16, bank: u16, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleScanError {
    #[error("ROC {roc} bank {bank} was not found in the scanned buffer")]
    BankNotFound { roc: u16, bank: u16 },
    #[error("ROC {roc} bank {bank} holds {content} data, not 32-bit module data")]
    NotWordData {
        roc: u16,
        bank: u16,
        content: ContentType,
    },
    #[error("ROC {roc} bank {bank}: event header at word {index} found before any block header")]
    EventHeaderWithoutSlot { roc: u16, bank: u16, index: usize },
}

#[derive(Debug, Error)]
pub enum UnblockError {
    #[error("Unblock needs {needed} words of output but the buffer holds only {capacity}")]
    BufferOverflow { needed: usize, capacity: usize },
    #[error("Unblock failed due to module scan error: {0}")]
    ScanError(#[from] ModuleScanError),
    #[error("Unblock found no ROC {roc} bank {bank} to copy from")]
    MissingBank { roc: u16, bank: u16 },
    #[error("Unblock found no trigger events in the block")]
    NoEvents,
}

#[derive(Debug, Error)]
pub enum EvioFileError {
    #[error("Could not open EvioFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("EvioFile block header has bad magic number 0x{0:08x}")]
    BadMagic(u32),
    #[error("EvioFile block header declares {0} words, which is smaller than the header itself")]
    BadBlockLength(usize),
    #[error("EvioFile event at block word {index} declares {length} words but the block ends first")]
    TruncatedEvent { index: usize, length: usize },
    #[error("EvioFile reached end-of-file")]
    EndOfFile,
    #[error("EvioFile recieved an IO error and failed: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to EvioFile error: {0}")]
    FileError(#[from] EvioFileError),
    #[error("Processor failed due to Unblock error: {0}")]
    UnblockError(#[from] UnblockError),
    #[error("Processor failed to convert summary to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
