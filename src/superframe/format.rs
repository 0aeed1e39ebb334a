//! Audio parameters carried in byte 2 of a DAB+ superframe and the access
//! unit table that follows them.

use serde::Serialize;

use crate::utils::error::{DabError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    /// 0 = 32 kHz, 1 = 48 kHz
    pub dac_rate: bool,
    pub sbr: bool,
    /// false = mono, true = stereo
    pub aac_channel_mode: bool,
    pub ps: bool,
    pub mpeg_surround: u8,
}

impl AudioFormat {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            dac_rate: (byte >> 6) & 1 == 1,
            sbr: (byte >> 5) & 1 == 1,
            aac_channel_mode: (byte >> 4) & 1 == 1,
            ps: (byte >> 3) & 1 == 1,
            mpeg_surround: byte & 0x07,
        }
    }

    pub fn to_byte(self) -> u8 {
        ((self.dac_rate as u8) << 6)
            | ((self.sbr as u8) << 5)
            | ((self.aac_channel_mode as u8) << 4)
            | ((self.ps as u8) << 3)
            | (self.mpeg_surround & 0x07)
    }

    /// Access units per superframe
    pub fn num_aus(self) -> usize {
        match (self.dac_rate, self.sbr) {
            (false, false) => 4,
            (false, true) => 2,
            (true, false) => 6,
            (true, true) => 3,
        }
    }

    /// Byte offset of the first access unit
    pub fn first_au_start(self) -> usize {
        match (self.dac_rate, self.sbr) {
            (false, false) => 8,
            (false, true) => 5,
            (true, false) => 11,
            (true, true) => 6,
        }
    }

    /// Output sample rate in Hz, with SBR the core runs at half of it
    pub fn sample_rate(self) -> u32 {
        if self.dac_rate { 48_000 } else { 32_000 }
    }

    /// Sample rate of the AAC core
    pub fn core_sample_rate(self) -> u32 {
        match (self.dac_rate, self.sbr) {
            (false, false) => 32_000,
            (false, true) => 16_000,
            (true, false) => 48_000,
            (true, true) => 24_000,
        }
    }

    /// Number of output channels, `None` for unsupported surround setups
    pub fn channels(self) -> Option<u8> {
        match self.mpeg_surround {
            0 => Some(if self.aac_channel_mode { 2 } else { 1 }),
            1 => Some(6),
            2 => Some(7),
            _ => None,
        }
    }

    /// AudioSpecificConfig for the AAC core: AAC-LC, 960 sample frames
    pub fn audio_specific_config(self) -> Result<[u8; 2]> {
        let channels = self.channels().ok_or_else(|| {
            DabError::superframe(format!(
                "unsupported MPEG surround configuration {}",
                self.mpeg_surround
            ))
        })?;
        let sample_rate_index: u8 = match (self.dac_rate, self.sbr) {
            (true, true) => 6,
            (true, false) => 3,
            (false, true) => 8,
            (false, false) => 5,
        };
        // object type 2 (AAC-LC), frame length flag set for 960 samples
        let asc0 = (0b00010 << 3) | (sample_rate_index >> 1);
        let asc1 = ((sample_rate_index & 0x01) << 7) | (channels << 3) | 0b100;
        Ok([asc0, asc1])
    }
}

/// Start offsets of every AU followed by the end of the audio part.
///
/// AU starts after the first are 12 bit values packed from byte 3 on.
pub fn au_boundaries(superframe: &[u8], format: AudioFormat, audio_len: usize) -> Vec<usize> {
    let num_aus = format.num_aus();
    let mut starts = Vec::with_capacity(num_aus + 1);
    starts.push(format.first_au_start());
    for i in 1..num_aus {
        // entry i sits at bit 24 + 12 * (i - 1)
        let bit = 24 + 12 * (i - 1);
        let byte = bit / 8;
        let value = if bit % 8 == 0 {
            ((superframe[byte] as usize) << 4) | ((superframe[byte + 1] as usize) >> 4)
        } else {
            (((superframe[byte] & 0x0f) as usize) << 8) | superframe[byte + 1] as usize
        };
        starts.push(value);
    }
    starts.push(audio_len);
    starts
}

/// Write the AU start table for the AUs after the first one
pub fn write_au_starts(superframe: &mut [u8], starts: &[usize]) {
    for (k, &start) in starts.iter().enumerate() {
        let bit = 24 + 12 * k;
        let byte = bit / 8;
        let value = (start & 0x0fff) as u16;
        if bit % 8 == 0 {
            superframe[byte] = (value >> 4) as u8;
            superframe[byte + 1] = (superframe[byte + 1] & 0x0f) | (((value & 0x0f) as u8) << 4);
        } else {
            superframe[byte] = (superframe[byte] & 0xf0) | ((value >> 8) as u8 & 0x0f);
            superframe[byte + 1] = value as u8;
        }
    }
}
