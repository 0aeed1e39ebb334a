use reed_solomon::{Decoder, Encoder};
use tracing::{debug, warn};

use crate::utils::consts::{RS_CODEWORD_LEN, RS_PARITY_LEN};

/// Outer Reed-Solomon protection of a DAB+ superframe.
///
/// A superframe of `120 * n` bytes holds `n` interleaved RS(120, 110)
/// codewords: codeword `j` consists of the bytes `j, j + n, j + 2n, ...`.
/// The first `110 * n` bytes carry the audio superframe, the last `10 * n`
/// bytes the parity.
pub struct SuperframeReedSolomon {
    encoder: Encoder,
    decoder: Decoder,
    columns: usize,
}

/// Result of error correction over one superframe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionReport {
    /// Number of bytes changed by the decoder
    pub bytes_corrected: usize,
    /// Codewords the decoder gave up on (left untouched)
    pub uncorrectable: usize,
}

impl CorrectionReport {
    pub fn success(&self) -> bool {
        self.uncorrectable == 0
    }
}

impl SuperframeReedSolomon {
    /// `columns` is the bit rate factor n (superframe bit rate / 8 kbit/s)
    pub fn new(columns: usize) -> Self {
        Self {
            encoder: Encoder::new(RS_PARITY_LEN),
            decoder: Decoder::new(RS_PARITY_LEN),
            columns,
        }
    }

    pub fn superframe_len(&self) -> usize {
        self.columns * RS_CODEWORD_LEN
    }

    pub fn data_len(&self) -> usize {
        self.columns * (RS_CODEWORD_LEN - RS_PARITY_LEN)
    }

    fn gather(&self, superframe: &[u8], column: usize) -> Vec<u8> {
        (0..RS_CODEWORD_LEN)
            .map(|row| superframe[row * self.columns + column])
            .collect()
    }

    fn scatter(&self, superframe: &mut [u8], column: usize, codeword: &[u8]) {
        for (row, &byte) in codeword.iter().enumerate() {
            superframe[row * self.columns + column] = byte;
        }
    }

    /// Fill the parity part of a superframe whose data part is set
    pub fn encode(&self, superframe: &mut [u8]) {
        assert_eq!(superframe.len(), self.superframe_len());
        let data_rows = RS_CODEWORD_LEN - RS_PARITY_LEN;
        for column in 0..self.columns {
            let data: Vec<u8> = (0..data_rows)
                .map(|row| superframe[row * self.columns + column])
                .collect();
            let encoded = self.encoder.encode(&data);
            let mut codeword = data;
            codeword.extend_from_slice(encoded.ecc());
            self.scatter(superframe, column, &codeword);
        }
        debug!(
            "RS encoded superframe: {} codewords of RS({}, {})",
            self.columns,
            RS_CODEWORD_LEN,
            RS_CODEWORD_LEN - RS_PARITY_LEN
        );
    }

    /// Correct a received superframe in place
    pub fn correct(&self, superframe: &mut [u8]) -> CorrectionReport {
        let mut report = CorrectionReport::default();
        if superframe.len() != self.superframe_len() {
            warn!(
                "Superframe length {} does not match RS layout ({} bytes)",
                superframe.len(),
                self.superframe_len()
            );
            report.uncorrectable = self.columns;
            return report;
        }

        for column in 0..self.columns {
            let received = self.gather(superframe, column);
            if !self.decoder.is_corrupted(&received) {
                continue;
            }
            match self.decoder.correct(&received, None) {
                Ok(corrected) => {
                    let fixed: Vec<u8> = corrected
                        .data()
                        .iter()
                        .chain(corrected.ecc().iter())
                        .copied()
                        .collect();
                    report.bytes_corrected += received
                        .iter()
                        .zip(fixed.iter())
                        .filter(|(a, b)| a != b)
                        .count();
                    self.scatter(superframe, column, &fixed);
                }
                Err(e) => {
                    debug!("RS codeword {} uncorrectable: {:?}", column, e);
                    report.uncorrectable += 1;
                }
            }
        }

        if report.bytes_corrected > 0 {
            debug!("RS corrected {} bytes", report.bytes_corrected);
        }
        report
    }
}
