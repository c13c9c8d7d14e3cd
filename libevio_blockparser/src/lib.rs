//! # evio_blockparser
//!
//! evio_blockparser indexes the event buffers written by a JLab CODA data acquisition
//! front end running in block mode, written in Rust. It finds the ROC banks, module data
//! banks and the trigger bank of each CODA event, splits each module bank into slots and
//! events, and can "unblock" a multi-event block into one self-contained bank per
//! trigger.
//!
//! The parser never copies data. Every lookup hands back a slice of the buffer that was
//! parsed, and the index can only be reached through a [`block_parser::BlockView`] that
//! borrows that buffer.
//!
//! ## Building & Install
//!
//! To build and install the CLI use `cargo install --path ./evio_blockparser_cli` from the
//! top level repository. The binary will be installed to your cargo install location
//! (typically something like `~/.cargo/bin/`).
//!
//! ## Usage
//!
//! ```ignore
//! use libevio_blockparser::block_parser::BlockParser;
//!
//! let mut parser = BlockParser::new();
//! let mut view = parser.parse(&buffer);
//! let level = view.parse_jlab_bank(1, 3, false)?;
//! for slot in view.slot_list(1, 3) {
//!     let first_event = view.get_u32_event(1, 3, slot, 0);
//! }
//! ```
//!
//! ## Configuration
//!
//! The CLI is driven by a YAML configuration file. A template can be made with
//! `evio_blockparser_cli -p config.yaml new`. The format is as follows:
//!
//! ```yml
//! evio_path: None
//! summary_path: None
//! max_events: null
//! banks:
//! - roc_id: 1
//!   bank_id: 4
//!   kind: Ti
//!   swap: false
//! - roc_id: 1
//!   bank_id: 3
//!   kind: Fadc250
//!   swap: false
//! ignore_undefined_banks: false
//! unblock: false
//! output_endian: Host
//! output_capacity_words: 1048576
//! debug: []
//! ```
//!
//! - `banks`: how each (ROC, bank) pair is scanned. `kind` is one of `Ti`, `Ts`,
//! `Fadc250`, `Generic` or `!Other` (with a `once` field). Banks of kind `Other` are not
//! scanned, and are copied whole into the unblocked events (only the first one if `once`
//! is set). `swap` marks bank data written in the opposite byte order.
//! - `ignore_undefined_banks`: only index the banks listed in `banks`.
//! - `unblock`: reassemble every physics event into per-trigger banks.
//! - `output_endian`: byte order of the unblocked output (`Host`, `Little`, `Big`).
//! - `debug`: categories of detailed debug logging, e.g. `[BlockHeader, Unblock]`.
//!
//! ## Output
//!
//! The CLI writes a YAML summary of the file: the number of physics and control events,
//! the number of issues found, and per ROC and bank the number of blocks, events and the
//! slots that were present.
pub mod block_parser;
pub mod config;
pub mod constants;
pub mod error;
pub mod evio_file;
pub mod evio_stream;
pub mod index;
pub mod module_scan;
pub mod process;
pub mod tag_range;
pub mod trigger_bank;
pub mod unblock;
pub mod words;

#[cfg(test)]
mod testing;
