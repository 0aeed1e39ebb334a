use tracing::{debug, trace};

use super::PadEvent;
use crate::error_correction::crc::{append_crc16, verify_crc16};

/// Characters per dynamic label segment
pub const MAX_SEGMENT_CHARS: usize = 16;

/// Segments per label
pub const MAX_SEGMENTS: usize = 8;

const MAX_LABEL_BYTES: usize = MAX_SEGMENTS * MAX_SEGMENT_CHARS;

pub const CHARSET_EBU_LATIN: u8 = 0;
pub const CHARSET_UTF8: u8 = 15;

const COMMAND_CLEAR_DISPLAY: u8 = 1;

/// Two byte prefix plus the CRC
const SEGMENT_OVERHEAD: usize = 4;

/// Reassembles dynamic label segments from X-PAD subfields.
#[derive(Debug, Default)]
pub struct DynamicLabelDecoder {
    segment: Vec<u8>,
    segment_len: usize,
    last_segment: bool,
    label: Vec<u8>,
    charset: u8,
    crc_errors: usize,
}

impl DynamicLabelDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subfield with application type 2
    pub fn start(&mut self, subfield: &[u8]) -> Option<PadEvent> {
        self.segment.clear();
        if subfield.len() < 2 {
            return None;
        }
        let prefix = subfield[0];
        let field1 = prefix & 0x0f;

        if (prefix >> 4) & 0x01 == 1 {
            // command segment
            if field1 == COMMAND_CLEAR_DISPLAY {
                debug!("Dynamic label: clear display");
                self.label.clear();
                return Some(PadEvent::ClearDisplay);
            }
            trace!("Dynamic label command {} ignored", field1);
            return None;
        }

        self.segment_len = field1 as usize + 1 + SEGMENT_OVERHEAD;
        if (prefix >> 6) & 0x01 == 1 {
            self.label.clear();
            self.charset = subfield[1] >> 4;
        }
        self.last_segment = (prefix >> 5) & 0x01 == 1;
        self.append(subfield)
    }

    /// Subfield with application type 3
    pub fn continuation(&mut self, subfield: &[u8]) -> Option<PadEvent> {
        if self.segment.is_empty() {
            // continuation of a command segment
            return None;
        }
        self.append(subfield)
    }

    fn append(&mut self, subfield: &[u8]) -> Option<PadEvent> {
        let missing = self.segment_len.saturating_sub(self.segment.len());
        let take = subfield.len().min(missing);
        self.segment.extend_from_slice(&subfield[..take]);
        if self.segment.len() < self.segment_len {
            return None;
        }

        if !verify_crc16(&self.segment) {
            debug!("Dynamic label segment CRC failed");
            self.crc_errors += 1;
            self.reset();
            return None;
        }

        let chars = &self.segment[2..self.segment.len() - 2];
        if self.label.len() + chars.len() > MAX_LABEL_BYTES {
            debug!("Dynamic label longer than {} bytes, dropped", MAX_LABEL_BYTES);
            self.reset();
            return None;
        }
        self.label.extend_from_slice(chars);
        self.segment.clear();
        if !self.last_segment {
            return None;
        }

        let text = decode_text(self.charset, &self.label);
        debug!("Dynamic label: {:?}", text);
        let event = PadEvent::DynamicLabel {
            charset: self.charset,
            text,
        };
        self.label.clear();
        self.last_segment = false;
        Some(event)
    }

    fn reset(&mut self) {
        self.segment.clear();
        self.segment_len = 0;
        self.label.clear();
        self.last_segment = false;
    }

    pub fn crc_errors(&self) -> usize {
        self.crc_errors
    }
}

/// Label bytes to text. Character sets other than UTF-8 are read as
/// Latin-1, which agrees with the EBU set on printable ASCII.
pub fn decode_text(charset: u8, bytes: &[u8]) -> String {
    match charset {
        CHARSET_UTF8 => String::from_utf8_lossy(bytes).into_owned(),
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Split a label into CRC protected segments.
pub fn encode_label(text: &str, charset: u8, toggle: bool) -> Vec<Vec<u8>> {
    let bytes: Vec<u8> = match charset {
        CHARSET_UTF8 => text.as_bytes().to_vec(),
        _ => text
            .chars()
            .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
            .collect(),
    };
    let chunks: Vec<&[u8]> = bytes
        .chunks(MAX_SEGMENT_CHARS)
        .take(MAX_SEGMENTS)
        .collect();
    let count = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chars)| {
            let first = i == 0;
            let last = i + 1 == count;
            let prefix = ((toggle as u8) << 7)
                | ((first as u8) << 6)
                | ((last as u8) << 5)
                | ((chars.len() - 1) as u8 & 0x0f);
            let second = if first { charset << 4 } else { (i as u8 & 0x07) << 4 };
            let mut segment = vec![prefix, second];
            segment.extend_from_slice(chars);
            append_crc16(&mut segment);
            segment
        })
        .collect()
}

/// Command segment that clears the receiver display
pub fn clear_display_segment(toggle: bool) -> Vec<u8> {
    let mut segment = vec![((toggle as u8) << 7) | (1 << 4) | COMMAND_CLEAR_DISPLAY, 0];
    append_crc16(&mut segment);
    segment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &mut DynamicLabelDecoder, segment: &[u8], split: usize) -> Vec<PadEvent> {
        let mut events = Vec::new();
        let (head, tail) = segment.split_at(split.min(segment.len()));
        events.extend(decoder.start(head));
        if !tail.is_empty() {
            events.extend(decoder.continuation(tail));
        }
        events
    }

    #[test]
    fn test_multi_segment_label() {
        let text = "Now playing: a fairly long title";
        let segments = encode_label(text, CHARSET_UTF8, false);
        assert_eq!(segments.len(), 2);

        let mut decoder = DynamicLabelDecoder::new();
        let mut events = Vec::new();
        for segment in &segments {
            events.extend(feed(&mut decoder, segment, 12));
        }
        assert_eq!(
            events,
            vec![PadEvent::DynamicLabel {
                charset: CHARSET_UTF8,
                text: text.to_string()
            }]
        );
    }

    #[test]
    fn test_padding_bytes_ignored() {
        let segments = encode_label("Radio", CHARSET_EBU_LATIN, true);
        let mut padded = segments[0].clone();
        padded.resize(16, 0);
        let mut decoder = DynamicLabelDecoder::new();
        let event = decoder.start(&padded);
        assert_eq!(
            event,
            Some(PadEvent::DynamicLabel {
                charset: CHARSET_EBU_LATIN,
                text: "Radio".to_string()
            })
        );
    }

    #[test]
    fn test_crc_failure_resets_label() {
        let segments = encode_label("0123456789abcdefXYZ", CHARSET_UTF8, false);
        let mut decoder = DynamicLabelDecoder::new();
        assert!(decoder.start(&segments[0]).is_none());
        let mut broken = segments[1].clone();
        broken[3] ^= 0x01;
        assert!(decoder.start(&broken).is_none());
        assert_eq!(decoder.crc_errors(), 1);
        // the label restarts, so only the last segment is published
        assert_eq!(
            decoder.start(&segments[1]),
            Some(PadEvent::DynamicLabel {
                charset: CHARSET_UTF8,
                text: "XYZ".to_string()
            })
        );
    }

    #[test]
    fn test_endless_continuation_is_bounded() {
        let text: String = (0..MAX_LABEL_BYTES)
            .map(|i| (b'A' + (i / MAX_SEGMENT_CHARS) as u8) as char)
            .collect();
        let segments = encode_label(&text, CHARSET_UTF8, false);
        assert_eq!(segments.len(), MAX_SEGMENTS);

        let mut decoder = DynamicLabelDecoder::new();
        assert!(decoder.start(&segments[0]).is_none());
        // the eighth repeat would take the label past its maximum length
        for _ in 0..MAX_SEGMENTS {
            assert!(decoder.start(&segments[1]).is_none());
            assert!(decoder.label.len() <= MAX_LABEL_BYTES);
        }
        assert!(decoder.label.is_empty());
        assert_eq!(
            decoder.start(&segments[MAX_SEGMENTS - 1]),
            Some(PadEvent::DynamicLabel {
                charset: CHARSET_UTF8,
                text: "H".repeat(MAX_SEGMENT_CHARS)
            })
        );
    }

    #[test]
    fn test_clear_display() {
        let mut decoder = DynamicLabelDecoder::new();
        assert_eq!(
            decoder.start(&clear_display_segment(false)),
            Some(PadEvent::ClearDisplay)
        );
    }
}
