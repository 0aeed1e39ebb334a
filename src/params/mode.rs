//! DAB transmission modes and the per-mode frame geometry.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::utils::consts::CIF_BITS;
use crate::utils::error::{DabError, Result};

/// DAB transmission mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DabMode {
    /// Mode I: 1536 carriers, VHF Band III.
    I,
    /// Mode II: 384 carriers, L-Band.
    II,
    /// Mode III: 192 carriers, below 3 GHz.
    III,
    /// Mode IV: 768 carriers, L-Band.
    IV,
}

impl DabMode {
    pub fn from_number(mode: u8) -> Result<Self> {
        match mode {
            1 => Ok(DabMode::I),
            2 => Ok(DabMode::II),
            3 => Ok(DabMode::III),
            4 => Ok(DabMode::IV),
            other => Err(DabError::config(format!(
                "unknown transmission mode {} (expected 1..4)",
                other
            ))),
        }
    }

    pub fn number(self) -> u8 {
        match self {
            DabMode::I => 1,
            DabMode::II => 2,
            DabMode::III => 3,
            DabMode::IV => 4,
        }
    }

    /// Highest carrier frequency the mode is specified for (Hz).
    fn max_frequency_hz(self) -> f64 {
        match self {
            DabMode::I => 375e6,
            DabMode::II | DabMode::IV => 1.5e9,
            DabMode::III => 3e9,
        }
    }
}

/// Frame geometry of a transmission mode, as seen after differential
/// demodulation: every symbol is a vector of `2 * num_carriers` soft bits.
#[derive(Debug, Clone, Serialize)]
pub struct DabParameters {
    pub mode: DabMode,
    pub frequency_hz: f64,
    /// Number of active carriers K.
    pub num_carriers: usize,
    /// OFDM symbols per transmission frame, phase reference symbol included.
    pub num_symbols: usize,
    /// Symbols occupied by the Fast Information Channel.
    pub num_fic_symbols: usize,
    /// Common Interleaved Frames per transmission frame.
    pub cifs_per_frame: usize,
}

impl DabParameters {
    pub fn new(mode: DabMode, frequency_hz: f64) -> Self {
        let (num_carriers, num_symbols, num_fic_symbols, cifs_per_frame) =
            match mode {
                DabMode::I => (1536, 76, 3, 4),
                DabMode::II => (384, 76, 3, 1),
                DabMode::III => (192, 153, 8, 1),
                DabMode::IV => (768, 76, 3, 2),
            };

        if frequency_hz > mode.max_frequency_hz() {
            warn!(
                "Mode {:?} is not specified for {:.3} MHz (limit {:.0} MHz)",
                mode,
                frequency_hz / 1e6,
                mode.max_frequency_hz() / 1e6
            );
        }

        let params = Self {
            mode,
            frequency_hz,
            num_carriers,
            num_symbols,
            num_fic_symbols,
            cifs_per_frame,
        };
        debug!(
            "DAB parameters: mode {:?}, K={}, {} symbols/frame, {} CIFs/frame, channel {}",
            mode,
            num_carriers,
            params.symbols_per_frame(),
            cifs_per_frame,
            params.channel_label().unwrap_or("-")
        );
        params
    }

    /// Soft bits per demodulated symbol.
    pub fn symbol_bits(&self) -> usize {
        2 * self.num_carriers
    }

    /// Demodulated symbols per transmission frame (the PRS is consumed).
    pub fn symbols_per_frame(&self) -> usize {
        self.num_symbols - 1
    }

    pub fn msc_symbols(&self) -> usize {
        self.symbols_per_frame() - self.num_fic_symbols
    }

    pub fn symbols_per_cif(&self) -> usize {
        self.msc_symbols() / self.cifs_per_frame
    }

    pub fn cif_bits(&self) -> usize {
        debug_assert_eq!(self.symbols_per_cif() * self.symbol_bits(), CIF_BITS);
        CIF_BITS
    }

    /// Soft bits in the FIC part of a frame.
    pub fn fic_bits(&self) -> usize {
        self.num_fic_symbols * self.symbol_bits()
    }

    /// Band III channel label for the configured frequency, if any.
    pub fn channel_label(&self) -> Option<&'static str> {
        channel_label(self.frequency_hz)
    }
}

/// DAB channel centre frequencies, VHF Band III (MHz).
const BAND_III_CHANNELS: &[(&str, f64)] = &[
    ("5A", 174.928),
    ("5B", 176.640),
    ("5C", 178.352),
    ("5D", 180.064),
    ("6A", 181.936),
    ("6B", 183.648),
    ("6C", 185.360),
    ("6D", 187.072),
    ("7A", 188.928),
    ("7B", 190.640),
    ("7C", 192.352),
    ("7D", 194.064),
    ("8A", 195.936),
    ("8B", 197.648),
    ("8C", 199.360),
    ("8D", 201.072),
    ("9A", 202.928),
    ("9B", 204.640),
    ("9C", 206.352),
    ("9D", 208.064),
    ("10A", 209.936),
    ("10N", 210.096),
    ("10B", 211.648),
    ("10C", 213.360),
    ("10D", 215.072),
    ("11A", 216.928),
    ("11N", 217.088),
    ("11B", 218.640),
    ("11C", 220.352),
    ("11D", 222.064),
    ("12A", 223.936),
    ("12N", 224.096),
    ("12B", 225.648),
    ("12C", 227.360),
    ("12D", 229.072),
    ("13A", 230.784),
    ("13B", 232.496),
    ("13C", 234.208),
    ("13D", 235.776),
    ("13E", 237.488),
    ("13F", 239.200),
];

pub fn channel_label(frequency_hz: f64) -> Option<&'static str> {
    let mhz = frequency_hz / 1e6;
    BAND_III_CHANNELS
        .iter()
        .find(|(_, f)| (f - mhz).abs() < 0.0005)
        .map(|(label, _)| *label)
}

pub fn channel_frequency_hz(label: &str) -> Option<f64> {
    BAND_III_CHANNELS
        .iter()
        .find(|(l, _)| l.eq_ignore_ascii_case(label))
        .map(|(_, f)| f * 1e6)
}
