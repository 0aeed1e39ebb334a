use tracing::{debug, trace};

use crate::error_correction::crc::verify_crc16;

/// Collects an MSC data group carried in X-PAD subfields.
///
/// A data group length indicator with a good CRC arms the assembler, the
/// next MOT start subfield opens the group and continuation subfields add
/// to it until the signalled length is reached.
#[derive(Debug, Default)]
pub struct DataGroupAssembler {
    expected_len: usize,
    expecting_start: bool,
    buffer: Vec<u8>,
    length_crc_errors: usize,
}

impl DataGroupAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn length_indicator(&mut self, subfield: &[u8]) {
        if subfield.len() >= 4 && verify_crc16(&subfield[..4]) {
            self.expected_len = (((subfield[0] & 0x3f) as usize) << 8) | subfield[1] as usize;
            self.expecting_start = true;
            trace!("Data group of {} bytes announced", self.expected_len);
        } else {
            debug!("Data group length indicator CRC failed");
            self.length_crc_errors += 1;
            self.expecting_start = false;
        }
    }

    pub fn start(&mut self, subfield: &[u8]) -> Option<Vec<u8>> {
        if !self.expecting_start {
            return None;
        }
        self.expecting_start = false;
        self.buffer.clear();
        self.append(subfield)
    }

    pub fn continuation(&mut self, subfield: &[u8]) -> Option<Vec<u8>> {
        if self.expecting_start || self.buffer.is_empty() {
            return None;
        }
        self.append(subfield)
    }

    fn append(&mut self, subfield: &[u8]) -> Option<Vec<u8>> {
        self.buffer.extend_from_slice(subfield);
        if self.buffer.len() < self.expected_len {
            return None;
        }
        let mut group = std::mem::take(&mut self.buffer);
        group.truncate(self.expected_len);
        self.expected_len = 0;
        Some(group)
    }

    pub fn length_crc_errors(&self) -> usize {
        self.length_crc_errors
    }
}
