use bit_set::BitSet;
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::module_scan::ModuleKind;

/// Categories of detailed debug output. Each one gates a family of `log::debug!` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Show {
    BlockHeader,
    BlockTrailer,
    EventHeader,
    EventTimestamp,
    Other,
    BankFound,
    FillEvents,
    Unblock,
    IgnoredBanks,
    SegmentFound,
    BankNotFound,
}

/// The set of enabled debug categories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugMask(BitSet);

impl DebugMask {
    pub fn from_categories(categories: &[Show]) -> Self {
        let mut mask = Self::default();
        for category in categories {
            mask.enable(*category);
        }
        mask
    }

    pub fn enable(&mut self, category: Show) {
        self.0.insert(category as usize);
    }

    pub fn is_set(&self, category: Show) -> bool {
        self.0.contains(category as usize)
    }
}

/// Byte order of the words written by the unblocker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Endian {
    #[default]
    Host,
    Little,
    Big,
}

impl Endian {
    /// Words must be byte-swapped to reach this order from host order
    pub fn needs_swap(&self) -> bool {
        match self {
            Self::Host => false,
            Self::Little => cfg!(target_endian = "big"),
            Self::Big => cfg!(target_endian = "little"),
        }
    }
}

/// How one (ROC, bank) pair should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankConfig {
    pub roc_id: u16,
    pub bank_id: u16,
    pub kind: ModuleKind,
    /// Data was written with the opposite byte order of this host
    pub swap: bool,
}

/// Structure representing the application configuration. Contains pathing and scan information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub evio_path: PathBuf,
    pub summary_path: PathBuf,
    pub max_events: Option<usize>,
    pub banks: Vec<BankConfig>,
    pub ignore_undefined_banks: bool,
    pub unblock: bool,
    pub output_endian: Endian,
    pub output_capacity_words: usize,
    pub debug: Vec<Show>,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be invalid
    fn default() -> Self {
        Self {
            evio_path: PathBuf::from("None"),
            summary_path: PathBuf::from("None"),
            max_events: None,
            banks: vec![
                BankConfig {
                    roc_id: 1,
                    bank_id: 4,
                    kind: ModuleKind::Ti,
                    swap: false,
                },
                BankConfig {
                    roc_id: 1,
                    bank_id: 3,
                    kind: ModuleKind::Fadc250,
                    swap: false,
                },
            ],
            ignore_undefined_banks: false,
            unblock: false,
            output_endian: Endian::Host,
            output_capacity_words: 1 << 20,
            debug: vec![],
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the config as YAML, e.g. to make a template
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    pub fn debug_mask(&self) -> DebugMask {
        DebugMask::from_categories(&self.debug)
    }

    /// Bank configurations keyed by (ROC id, bank id). Later duplicates win.
    pub fn bank_map(&self) -> FxHashMap<(u16, u16), BankConfig> {
        self.banks
            .iter()
            .map(|bank| ((bank.roc_id, bank.bank_id), *bank))
            .collect()
    }

    pub fn has_trigger_module(&self) -> bool {
        self.banks.iter().any(|b| b.kind.is_trigger_module())
    }

    pub fn is_output_capacity_valid(&self) -> bool {
        self.output_capacity_words >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_round_trip() {
        let mut config = Config::default();
        config.banks.push(BankConfig {
            roc_id: 2,
            bank_id: 9,
            kind: ModuleKind::Other { once: true },
            swap: true,
        });
        config.debug = vec![Show::BlockHeader, Show::Unblock];
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_template_written_and_read_back() {
        let path = std::env::temp_dir().join(format!("template_{}.yaml", std::process::id()));
        Config::default().write_config_file(&path).unwrap();
        let read = Config::read_config_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(read, Config::default());
    }

    #[test]
    fn test_debug_mask() {
        let mask = DebugMask::from_categories(&[Show::SegmentFound, Show::BlockTrailer]);
        assert!(mask.is_set(Show::SegmentFound));
        assert!(mask.is_set(Show::BlockTrailer));
        assert!(!mask.is_set(Show::BlockHeader));
        assert!(!DebugMask::default().is_set(Show::BlockHeader));
    }

    #[test]
    fn test_bank_map_lookup() {
        let config = Config::default();
        let map = config.bank_map();
        assert_eq!(map[&(1, 4)].kind, ModuleKind::Ti);
        assert!(!map.contains_key(&(4, 1)));
        assert!(config.has_trigger_module());
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::read_config_file(Path::new("/does/not/exist.yaml"));
        assert!(matches!(result, Err(ConfigError::BadFilePath(_))));
    }

    #[test]
    fn test_endian_swap() {
        assert!(!Endian::Host.needs_swap());
        assert_ne!(Endian::Little.needs_swap(), Endian::Big.needs_swap());
    }
}
