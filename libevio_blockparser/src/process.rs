use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::block_parser::{BlockParser, BlockView};
use super::config::Config;
use super::error::{EvioFileError, ProcessorError, UnblockError};
use super::evio_file::EvioFile;
use super::index::CodaEvent;
use super::unblock::Unblocker;

/// What was seen of one data bank over the whole file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankSummary {
    pub blocks: usize,
    pub events: usize,
    pub slot_mask: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RocSummary {
    pub blocks: usize,
    pub sync_blocks: usize,
    pub banks: BTreeMap<u16, BankSummary>,
}

/// Totals of a processed file, written out as YAML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub events_read: usize,
    pub physics_events: usize,
    pub control_events: usize,
    pub unknown_events: usize,
    pub issues: usize,
    pub scan_errors: usize,
    pub unblock_errors: usize,
    pub triggers_unblocked: usize,
    pub words_unblocked: usize,
    pub rocs: BTreeMap<u16, RocSummary>,
}

impl ScanSummary {
    /// Fold the index of one scanned physics event into the totals
    fn add_block(&mut self, view: &BlockView) {
        for roc in view.index().rocs.values() {
            let roc_summary = self.rocs.entry(roc.roc_id).or_default();
            roc_summary.blocks += 1;
            if roc.is_sync() {
                roc_summary.sync_blocks += 1;
            }
            for bank in roc.banks.values() {
                let bank_summary = roc_summary.banks.entry(bank.bank_id).or_default();
                bank_summary.blocks += 1;
                bank_summary.events += bank
                    .slots
                    .values()
                    .next()
                    .map(|s| s.events.len())
                    .unwrap_or(0);
                bank_summary.slot_mask |= bank.slot_mask_bits();
            }
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ProcessorError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml_str)?;
        Ok(())
    }
}

/// Scan (and optionally unblock) every event of the configured EVIO file
///
/// Progress is reported as a fraction of the file read through `status`.
pub fn process_file(config: &Config, status: &Mutex<f32>) -> Result<ScanSummary, ProcessorError> {
    let mut file = EvioFile::new(&config.evio_path)?;
    let total_bytes = file.size_bytes();
    log::info!(
        "Total file size: {}",
        human_bytes::human_bytes(total_bytes as f64)
    );

    if config.unblock && !config.has_trigger_module() {
        log::info!("No TI/TS bank configured, trigger counts come from the event block level.");
    }

    let mut parser = BlockParser::from_config(config);
    let mut unblocker = Unblocker::from_config(config);
    let mut output = if config.unblock {
        vec![0u32; config.output_capacity_words]
    } else {
        Vec::new()
    };

    let flush_frac: f32 = 0.01;
    let flush_val = (total_bytes as f64 * flush_frac as f64) as u64;
    let mut last_flush = 0;
    let mut summary = ScanSummary::default();

    loop {
        if config.max_events.is_some_and(|max| summary.events_read >= max) {
            log::info!("Reached maximum of {} events.", summary.events_read);
            break;
        }
        let event = match file.get_next_event() {
            Ok(event) => event,
            Err(EvioFileError::EndOfFile) => break,
            Err(e) => return Err(ProcessorError::FileError(e)),
        };
        summary.events_read += 1;

        let mut view = parser.parse(&event);
        match view.event() {
            Some(CodaEvent::Physics { .. }) => {
                summary.physics_events += 1;
                if config.unblock {
                    match unblocker.unblock(&mut view, &mut output) {
                        Ok(words) => {
                            summary.triggers_unblocked += unblocker.events().len();
                            summary.words_unblocked += words;
                        }
                        Err(e @ UnblockError::BufferOverflow { .. }) => {
                            return Err(ProcessorError::UnblockError(e))
                        }
                        Err(e) => {
                            log::warn!("Event {} could not be unblocked: {e}", summary.events_read);
                            summary.unblock_errors += 1;
                        }
                    }
                } else if let Err(e) = view.scan_configured_banks() {
                    log::warn!("Event {}: {e}", summary.events_read);
                    summary.scan_errors += 1;
                }
                summary.add_block(&view);
            }
            Some(CodaEvent::Control { .. }) => summary.control_events += 1,
            None => summary.unknown_events += 1,
        }
        summary.issues += view.issues().len();

        if file.bytes_read() - last_flush > flush_val {
            last_flush = file.bytes_read();
            if let Ok(mut stat) = status.lock() {
                *stat = file.bytes_read() as f32 / total_bytes.max(1) as f32;
            }
        }
    }

    if let Ok(mut stat) = status.lock() {
        *stat = 1.0;
    }
    log::info!(
        "Read {} events ({} physics, {} control) with {} issues.",
        summary.events_read,
        summary.physics_events,
        summary.control_events,
        summary.issues
    );
    Ok(summary)
}

/// The function to be called by a separate thread (typically the CLI).
/// Processes the file and writes the summary to the configured path
pub fn process(config: Config, status: Arc<Mutex<f32>>) -> Result<(), ProcessorError> {
    log::info!("Processing {}...", config.evio_path.to_string_lossy());
    let summary = process_file(&config, &status)?;
    summary.write(&config.summary_path)?;
    log::info!(
        "Wrote summary to {}.",
        config.summary_path.to_string_lossy()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BankConfig;
    use crate::module_scan::ModuleKind;
    use crate::testing::{evio_block, jlab_block, EvioBuilder};
    use crate::words::ContentType;
    use std::path::PathBuf;

    fn physics_event() -> Vec<u32> {
        let mut b = EvioBuilder::new();
        b.open_bank(0xFF50, ContentType::Bank, 2);
        b.open_bank(1, ContentType::Bank, 2);
        b.open_bank(3, ContentType::UInt32, 0);
        b.words(&jlab_block(6, 1, 1, &[&[0xA], &[0xB]]));
        b.close();
        b.close();
        b.close();
        b.finish()
    }

    fn write_file(name: &str, events: &[Vec<u32>]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{name}_{}.evio", std::process::id()));
        let bytes: Vec<u8> = evio_block(1, events, true)
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn config_for(path: PathBuf, unblock: bool) -> Config {
        Config {
            evio_path: path,
            banks: vec![BankConfig {
                roc_id: 1,
                bank_id: 3,
                kind: ModuleKind::Fadc250,
                swap: false,
            }],
            unblock,
            output_capacity_words: 256,
            ..Default::default()
        }
    }

    #[test]
    fn test_scan_file() {
        let control = vec![3, 0xFFD2_0100, 0, 0];
        let path = write_file("scan", &[control, physics_event(), physics_event()]);
        let config = config_for(path.clone(), false);
        let status = Mutex::new(0.0);
        let summary = process_file(&config, &status).unwrap();
        std::fs::remove_file(path).unwrap();

        assert_eq!(summary.events_read, 3);
        assert_eq!(summary.physics_events, 2);
        assert_eq!(summary.control_events, 1);
        assert_eq!(summary.issues, 0);
        let bank = &summary.rocs[&1].banks[&3];
        assert_eq!(bank.blocks, 2);
        assert_eq!(bank.events, 4);
        assert_eq!(bank.slot_mask, 1 << 6);
        assert_eq!(*status.lock().unwrap(), 1.0);
    }

    #[test]
    fn test_unblock_file_with_event_limit() {
        let path = write_file("unblock", &[physics_event(), physics_event(), physics_event()]);
        let mut config = config_for(path.clone(), true);
        config.max_events = Some(2);
        let summary = process_file(&config, &Mutex::new(0.0)).unwrap();
        std::fs::remove_file(path).unwrap();

        assert_eq!(summary.events_read, 2);
        assert_eq!(summary.triggers_unblocked, 4);
        assert_eq!(summary.unblock_errors, 0);
    }

    #[test]
    fn test_summary_yaml() {
        let mut summary = ScanSummary {
            events_read: 4,
            ..Default::default()
        };
        summary.rocs.entry(2).or_default().blocks = 3;
        let yaml = serde_yaml::to_string(&summary).unwrap();
        let parsed: ScanSummary = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, summary);
    }
}
