use serde::Serialize;
use tracing::{debug, warn};

use super::format::{AudioFormat, au_boundaries};
use crate::error_correction::crc::verify_crc16;
use crate::error_correction::{CorrectionReport, SuperframeReedSolomon};
use crate::pad::{PadDecoder, PadEvent};
use crate::utils::consts::{MAX_AU_PAYLOAD, SUPERFRAME_FORMAT_BYTE};
use crate::utils::error::{DabError, Result};

/// Syntax element ID of an AAC data stream element
const ID_DSE: u8 = 4;

/// One access unit with its CRC already checked and removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    pub index: usize,
    pub data: Vec<u8>,
}

impl AccessUnit {
    /// PAD bytes of a leading data stream element, if any
    pub fn pad(&self) -> Option<&[u8]> {
        if self.data.len() < 2 || (self.data[0] >> 5) & 0x07 != ID_DSE {
            return None;
        }
        let mut count = self.data[1] as usize;
        let mut start = 2;
        if count == 255 {
            count += *self.data.get(2)? as usize;
            start = 3;
        }
        self.data.get(start..start + count)
    }
}

#[derive(Debug, Clone)]
pub struct DecodedSuperframe {
    pub format: AudioFormat,
    pub correction: CorrectionReport,
    pub access_units: Vec<AccessUnit>,
    pub au_crc_errors: usize,
    pub pad_events: Vec<PadEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuperframeStats {
    pub superframes: usize,
    pub rejected: usize,
    pub rs_corrected_bytes: usize,
    pub rs_uncorrectable: usize,
    pub access_units: usize,
    pub au_crc_errors: usize,
}

/// DAB+ superframe decoder: RS correction, AU extraction and PAD.
pub struct SuperframeDecoder {
    rs: SuperframeReedSolomon,
    pad: PadDecoder,
    stats: SuperframeStats,
    last_format: Option<AudioFormat>,
}

impl SuperframeDecoder {
    /// `bit_rate_n` is the subchannel bit rate divided by 8 kbit/s
    pub fn new(bit_rate_n: usize) -> Self {
        Self {
            rs: SuperframeReedSolomon::new(bit_rate_n),
            pad: PadDecoder::new(),
            stats: SuperframeStats::default(),
            last_format: None,
        }
    }

    pub fn superframe_len(&self) -> usize {
        self.rs.superframe_len()
    }

    pub fn decode(&mut self, superframe: &[u8]) -> Result<DecodedSuperframe> {
        if superframe.len() != self.rs.superframe_len() {
            self.stats.rejected += 1;
            return Err(DabError::superframe(format!(
                "superframe of {} bytes, expected {}",
                superframe.len(),
                self.rs.superframe_len()
            )));
        }

        let mut buf = superframe.to_vec();
        let correction = self.rs.correct(&mut buf);
        self.stats.rs_corrected_bytes += correction.bytes_corrected;
        if !correction.success() {
            warn!(
                "{} RS codewords uncorrectable, continuing with received bytes",
                correction.uncorrectable
            );
            self.stats.rs_uncorrectable += correction.uncorrectable;
        }

        let audio_len = self.rs.data_len();
        let format = AudioFormat::from_byte(buf[SUPERFRAME_FORMAT_BYTE]);
        if self.last_format != Some(format) {
            debug!(
                "Audio format: {} Hz, SBR {}, PS {}, channels {:?}, {} AUs",
                format.sample_rate(),
                format.sbr,
                format.ps,
                format.channels(),
                format.num_aus()
            );
            self.last_format = Some(format);
        }

        let bounds = au_boundaries(&buf, format, audio_len);
        if let Err(e) = check_boundaries(&bounds) {
            self.stats.rejected += 1;
            return Err(e);
        }

        let mut access_units = Vec::with_capacity(format.num_aus());
        let mut au_crc_errors = 0;
        let mut pad_events = Vec::new();
        for (index, window) in bounds.windows(2).enumerate() {
            let au = &buf[window[0]..window[1]];
            if !verify_crc16(au) {
                debug!("AU {} CRC failed", index);
                au_crc_errors += 1;
                continue;
            }
            let unit = AccessUnit {
                index,
                data: au[..au.len() - 2].to_vec(),
            };
            if let Some(pad) = unit.pad() {
                pad_events.extend(self.pad.process(pad));
            }
            access_units.push(unit);
        }

        self.stats.superframes += 1;
        self.stats.access_units += access_units.len();
        self.stats.au_crc_errors += au_crc_errors;
        Ok(DecodedSuperframe {
            format,
            correction,
            access_units,
            au_crc_errors,
            pad_events,
        })
    }

    pub fn stats(&self) -> &SuperframeStats {
        &self.stats
    }

    pub fn pad_stats(&self) -> &crate::pad::PadStats {
        self.pad.stats()
    }
}

fn check_boundaries(bounds: &[usize]) -> Result<()> {
    for window in bounds.windows(2) {
        if window[1] < window[0] + 2 {
            return Err(DabError::superframe(format!(
                "AU start {} followed by {}",
                window[0], window[1]
            )));
        }
        let payload = window[1] - window[0] - 2;
        if payload >= MAX_AU_PAYLOAD {
            return Err(DabError::superframe(format!(
                "AU payload of {} bytes exceeds {}",
                payload, MAX_AU_PAYLOAD
            )));
        }
    }
    Ok(())
}
