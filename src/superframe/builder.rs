use tracing::trace;

use super::format::{AudioFormat, write_au_starts};
use crate::error_correction::SuperframeReedSolomon;
use crate::error_correction::crc::{append_crc16, insert_firecode};
use crate::utils::consts::{FRAMES_PER_SUPERFRAME, MAX_AU_PAYLOAD, SUPERFRAME_FORMAT_BYTE};
use crate::utils::error::{DabError, Result};

/// CRC trailer of every AU
const AU_CRC_LEN: usize = 2;

/// Transmitter side of the DAB+ superframe: access units in, five logical
/// frames with header, firecode and RS parity out.
pub struct SuperframeBuilder {
    format: AudioFormat,
    rs: SuperframeReedSolomon,
}

impl SuperframeBuilder {
    pub fn new(bit_rate_n: usize, format: AudioFormat) -> Self {
        Self {
            format,
            rs: SuperframeReedSolomon::new(bit_rate_n),
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Bytes available for AU payloads (CRCs excluded)
    pub fn payload_capacity(&self) -> usize {
        self.rs.data_len() - self.format.first_au_start() - AU_CRC_LEN * self.format.num_aus()
    }

    /// Payload sizes that fill the superframe exactly, spread evenly
    pub fn au_payload_sizes(&self) -> Vec<usize> {
        let num = self.format.num_aus();
        let capacity = self.payload_capacity();
        (0..num)
            .map(|i| capacity / num + usize::from(i < capacity % num))
            .collect()
    }

    /// AU payload starting with a data stream element that carries `pad`,
    /// filled up to `len` bytes with `fill`
    pub fn au_with_pad(pad: &[u8], len: usize, fill: &[u8]) -> Vec<u8> {
        let mut au = vec![0x80];
        if pad.len() >= 255 {
            au.push(255);
            au.push((pad.len() - 255).min(255) as u8);
        } else {
            au.push(pad.len() as u8);
        }
        au.extend_from_slice(pad);
        let missing = len.saturating_sub(au.len());
        au.extend(fill.iter().copied().cycle().take(missing));
        au
    }

    /// Build one superframe. `payloads` must hold exactly one entry per AU;
    /// PADs, when given, are placed in front of the corresponding payload.
    /// A short last AU is zero padded up to the end of the audio part.
    pub fn build(&self, payloads: &[Vec<u8>], pads: &[Option<Vec<u8>>]) -> Result<Vec<Vec<u8>>> {
        let num = self.format.num_aus();
        if payloads.len() != num {
            return Err(DabError::superframe(format!(
                "{} AUs given, format carries {}",
                payloads.len(),
                num
            )));
        }

        let units: Vec<Vec<u8>> = payloads
            .iter()
            .enumerate()
            .map(|(i, payload)| match pads.get(i) {
                Some(Some(pad)) => {
                    let mut unit = Self::au_with_pad(pad, 0, &[]);
                    unit.extend_from_slice(payload);
                    unit
                }
                _ => payload.clone(),
            })
            .collect();

        let used: usize = units.iter().map(|u| u.len()).sum();
        if used > self.payload_capacity() {
            return Err(DabError::superframe(format!(
                "AU payloads of {} bytes exceed capacity {}",
                used,
                self.payload_capacity()
            )));
        }

        let mut superframe = vec![0u8; self.rs.superframe_len()];
        superframe[SUPERFRAME_FORMAT_BYTE] = self.format.to_byte();

        let mut starts = Vec::with_capacity(num);
        let mut offset = self.format.first_au_start();
        for (i, unit) in units.iter().enumerate() {
            let mut au = unit.clone();
            if i + 1 == num {
                let end = self.rs.data_len() - AU_CRC_LEN;
                au.resize(end - offset, 0);
            }
            if au.len() >= MAX_AU_PAYLOAD {
                return Err(DabError::superframe(format!(
                    "AU {} payload of {} bytes exceeds {}",
                    i,
                    au.len(),
                    MAX_AU_PAYLOAD
                )));
            }
            append_crc16(&mut au);
            if i > 0 {
                starts.push(offset);
            }
            superframe[offset..offset + au.len()].copy_from_slice(&au);
            offset += au.len();
        }
        write_au_starts(&mut superframe, &starts);
        insert_firecode(&mut superframe);
        self.rs.encode(&mut superframe);
        trace!("Built superframe with AU starts {:?}", starts);

        let frame_len = superframe.len() / FRAMES_PER_SUPERFRAME;
        Ok(superframe.chunks(frame_len).map(|c| c.to_vec()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_correction::crc::verify_firecode;

    #[test]
    fn test_frames_and_firecode() {
        let builder = SuperframeBuilder::new(15, AudioFormat::from_byte(0b0101_0000));
        let payloads: Vec<Vec<u8>> = builder
            .au_payload_sizes()
            .into_iter()
            .map(|len| vec![0x11; len])
            .collect();
        let frames = builder.build(&payloads, &[]).unwrap();
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| f.len() == 24 * 15));
        assert!(verify_firecode(&frames[0]));
    }

    #[test]
    fn test_payload_sizes_fill_capacity() {
        for byte in [0x00, 0x20, 0x40, 0x60] {
            let builder = SuperframeBuilder::new(3, AudioFormat::from_byte(byte));
            let sizes = builder.au_payload_sizes();
            assert_eq!(sizes.len(), builder.format().num_aus());
            assert_eq!(sizes.iter().sum::<usize>(), builder.payload_capacity());
        }
    }

    #[test]
    fn test_too_many_bytes() {
        let builder = SuperframeBuilder::new(1, AudioFormat::from_byte(0x20));
        let payloads = vec![vec![0; 60], vec![0; 60]];
        assert!(builder.build(&payloads, &[]).is_err());
        assert!(builder.build(&payloads[..1], &[]).is_err());
    }

    #[test]
    fn test_au_with_pad_layout() {
        let au = SuperframeBuilder::au_with_pad(&[1, 2, 3], 8, &[9]);
        assert_eq!(au, vec![0x80, 3, 1, 2, 3, 9, 9, 9]);
    }
}
