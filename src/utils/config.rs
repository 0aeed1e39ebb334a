use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::params::{DabMode, DabParameters, Protection, Subchannel};
use crate::utils::consts::*;
use crate::utils::error::{DabError, Result};

/// Receiver settings, loadable from a TOML file. Every field has a default,
/// so a partial file only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReceiverConfig {
    pub mode: u8,
    pub frequency_hz: f64,
    pub subchannel: SubchannelConfig,
    /// Bit rate factor used by the firecode checker
    pub bit_rate_n: usize,
    pub verbose: bool,
    pub debug: bool,
    pub debug_dir: PathBuf,
    pub files: FileConfig,
    /// Decode checked superframes down to AUs and PAD
    pub decode_superframes: bool,
    /// Capacity of the channels between flowgraph stages
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubchannelConfig {
    pub address: usize,
    pub size: usize,
    /// 0..3, EEP level 1..4
    pub protection: u8,
    /// 0 = EEP-A, 1 = EEP-B
    pub option: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub frames: String,
    pub triggers: String,
    pub output: String,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            mode: DEFAULT_MODE,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            subchannel: SubchannelConfig::default(),
            bit_rate_n: DEFAULT_BIT_RATE_N,
            verbose: true,
            debug: true,
            debug_dir: PathBuf::from(DEFAULT_DEBUG_DIR),
            files: FileConfig::default(),
            decode_superframes: false,
            channel_capacity: 64,
        }
    }
}

impl Default for SubchannelConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_SUBCH_ADDRESS,
            size: DEFAULT_SUBCH_SIZE,
            protection: DEFAULT_PROTECTION,
            option: 0,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            frames: TRANSMISSION_FRAME_FILE.to_string(),
            triggers: TRANSMISSION_TRIGGER_FILE.to_string(),
            output: CHECKED_FIRECODE_FILE.to_string(),
        }
    }
}

impl ReceiverConfig {
    /// 从 TOML 文件载入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ReceiverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DabError::config(format!("cannot serialise config: {}", e)))
    }

    /// 检查参数组合是否合法
    pub fn validate(&self) -> Result<()> {
        let subchannel = self.subchannel()?;
        if self.bit_rate_n == 0 {
            return Err(DabError::config("bit_rate_n must be positive"));
        }
        if subchannel.bit_rate_n() != self.bit_rate_n {
            tracing::warn!(
                "Firecode bit rate factor {} differs from subchannel rate {} kbit/s (n = {})",
                self.bit_rate_n,
                subchannel.bitrate_kbps(),
                subchannel.bit_rate_n()
            );
        }
        if self.channel_capacity == 0 {
            return Err(DabError::config("channel_capacity must be positive"));
        }
        Ok(())
    }

    pub fn dab_parameters(&self) -> Result<DabParameters> {
        Ok(DabParameters::new(
            DabMode::from_number(self.mode)?,
            self.frequency_hz,
        ))
    }

    pub fn subchannel(&self) -> Result<Subchannel> {
        let protection = Protection::from_index(self.subchannel.protection, self.subchannel.option)?;
        Subchannel::new(self.subchannel.address, self.subchannel.size, protection)
    }

    pub fn frames_path(&self) -> PathBuf {
        self.debug_dir.join(&self.files.frames)
    }

    pub fn triggers_path(&self) -> PathBuf {
        self.debug_dir.join(&self.files.triggers)
    }

    pub fn output_path(&self) -> PathBuf {
        self.debug_dir.join(&self.files.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_harness() {
        let config = ReceiverConfig::default();
        assert!(config.validate().is_ok());
        let sc = config.subchannel().unwrap();
        assert_eq!(sc.bitrate_kbps(), 120);
        assert_eq!(sc.bit_rate_n(), config.bit_rate_n);
        assert_eq!(
            config.output_path(),
            PathBuf::from("debug").join("checked_firecode.dat")
        );
    }

    #[test]
    fn test_partial_toml() {
        let config = ReceiverConfig::from_toml_str(
            r#"
            verbose = false
            [subchannel]
            address = 0
            "#,
        )
        .unwrap();
        assert!(!config.verbose);
        assert_eq!(config.subchannel.address, 0);
        assert_eq!(config.subchannel.size, DEFAULT_SUBCH_SIZE);
        assert_eq!(config.mode, DEFAULT_MODE);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let config = ReceiverConfig {
            mode: 7,
            ..Default::default()
        };
        assert!(config.dab_parameters().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ReceiverConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(ReceiverConfig::from_toml_str(&text).unwrap(), config);
    }
}
