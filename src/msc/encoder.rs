use tracing::trace;

use crate::error_correction::ConvolutionalEncoder;
use crate::error_correction::TimeInterleaver;
use crate::error_correction::crc::bytes_to_bits;
use crate::error_correction::energy_dispersal::disperse_bits;
use crate::error_correction::puncture::{puncture, puncturing_mask};
use crate::params::Subchannel;

/// Transmitter side of a subchannel: logical frame bytes in, the soft bits
/// (+1.0 for 0, -1.0 for 1) occupying the subchannel in one CIF out.
pub struct MscEncoder {
    subchannel: Subchannel,
    conv: ConvolutionalEncoder,
    mask: Vec<bool>,
    interleaver: TimeInterleaver,
}

impl MscEncoder {
    pub fn new(subchannel: Subchannel) -> Self {
        Self {
            conv: ConvolutionalEncoder::dab(),
            mask: puncturing_mask(&subchannel.puncturing()),
            interleaver: TimeInterleaver::new(subchannel.bits()),
            subchannel,
        }
    }

    pub fn subchannel(&self) -> &Subchannel {
        &self.subchannel
    }

    /// Hard bits of one CIF. Short frames are zero padded, long ones cut.
    pub fn encode_frame_bits(&mut self, frame: &[u8]) -> Vec<u8> {
        let mut bits = bytes_to_bits(frame);
        bits.resize(self.subchannel.logical_frame_bits(), 0);
        disperse_bits(&mut bits);

        self.conv.reset();
        let mother = self.conv.encode_terminated(&bits);
        let punctured = puncture(&self.mask, &mother);
        trace!(
            "MSC encode: {} info bits -> {} mother bits -> {} sent",
            bits.len(),
            mother.len(),
            punctured.len()
        );
        self.interleaver.interleave(&punctured)
    }

    pub fn encode_frame(&mut self, frame: &[u8]) -> Vec<f32> {
        self.encode_frame_bits(frame)
            .into_iter()
            .map(|b| if b == 0 { 1.0 } else { -1.0 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Protection;

    #[test]
    fn test_output_fills_subchannel() {
        for protection in [
            Protection::EepA(1),
            Protection::EepA(2),
            Protection::EepA(3),
            Protection::EepA(4),
        ] {
            let size = match protection {
                Protection::EepA(1) => 24,
                Protection::EepA(2) => 16,
                Protection::EepA(3) => 12,
                _ => 8,
            };
            let sc = Subchannel::new(100, size, protection).unwrap();
            let mut enc = MscEncoder::new(sc);
            let bits = enc.encode_frame_bits(&vec![0xA5; sc.logical_frame_bytes()]);
            assert_eq!(bits.len(), sc.bits(), "{}", protection.label());
        }
    }

    #[test]
    fn test_first_cif_only_carries_undelayed_bits() {
        let sc = Subchannel::new(0, 12, Protection::EepA(3)).unwrap();
        let mut enc = MscEncoder::new(sc);
        let bits = enc.encode_frame_bits(&vec![0xFF; sc.logical_frame_bytes()]);
        // positions with a non-zero delay still read the empty history
        for (i, &b) in bits.iter().enumerate() {
            if i % 16 != 0 {
                assert_eq!(b, 0);
            }
        }
    }
}
