//! F-PAD / X-PAD framing.
//!
//! A PAD field ends with the two F-PAD bytes. The X-PAD in front of them is
//! transmitted in reverse byte order; after reversing, the content
//! indicator list comes first and the data subfields follow in CI order.

use crate::error_correction::crc::append_crc16;
use crate::utils::error::{DabError, Result};

/// Subfield lengths selected by the 3 bit length index of a CI
pub const XPAD_SUBFIELD_LENGTHS: [usize; 8] = [4, 6, 8, 12, 16, 24, 32, 48];

/// At most four CIs in a variable size X-PAD
pub const MAX_CONTENT_INDICATORS: usize = 4;

pub mod app_type {
    pub const END_MARKER: u8 = 0;
    pub const DATA_GROUP_LENGTH: u8 = 1;
    pub const DYNAMIC_LABEL_START: u8 = 2;
    pub const DYNAMIC_LABEL_CONTINUATION: u8 = 3;
    pub const MOT_START: u8 = 12;
    pub const MOT_CONTINUATION: u8 = 13;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XPadKind {
    None,
    Short,
    Variable,
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FPad {
    pub xpad: XPadKind,
    /// Set when the X-PAD starts with content indicators
    pub ci_flag: bool,
}

impl FPad {
    pub fn parse(pad: &[u8]) -> Option<Self> {
        if pad.len() < 2 {
            return None;
        }
        let byte_l1 = pad[pad.len() - 2];
        let byte_l = pad[pad.len() - 1];
        let xpad = match (byte_l1 >> 4) & 0x03 {
            0 => XPadKind::None,
            1 => XPadKind::Short,
            2 => XPadKind::Variable,
            _ => XPadKind::Reserved,
        };
        Some(Self {
            xpad,
            ci_flag: (byte_l >> 1) & 0x01 == 1,
        })
    }

    pub fn to_bytes(self) -> [u8; 2] {
        let ind = match self.xpad {
            XPadKind::None => 0,
            XPadKind::Short => 1,
            XPadKind::Variable => 2,
            XPadKind::Reserved => 3,
        };
        [ind << 4, (self.ci_flag as u8) << 1]
    }
}

/// One X-PAD data subfield in logical byte order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPadSubfield {
    pub app_type: u8,
    pub data: Vec<u8>,
}

/// Split a PAD field with a variable size X-PAD into its subfields.
///
/// The CI list is checked against the X-PAD length: the subfield lengths
/// plus the CI bytes (end marker included) must cover it exactly.
pub fn parse_variable_xpad(pad: &[u8]) -> Result<Vec<XPadSubfield>> {
    if pad.len() < 3 {
        return Err(DabError::pad(format!("PAD of {} bytes has no X-PAD", pad.len())));
    }
    let xpad: Vec<u8> = pad[..pad.len() - 2].iter().rev().copied().collect();

    let mut cis = Vec::with_capacity(MAX_CONTENT_INDICATORS);
    let mut ci_bytes = 0;
    let mut subfield_sum = 0;
    while ci_bytes < MAX_CONTENT_INDICATORS && ci_bytes < xpad.len() {
        let ci = xpad[ci_bytes];
        ci_bytes += 1;
        let app = ci & 0x1f;
        if app == app_type::END_MARKER {
            break;
        }
        let len = XPAD_SUBFIELD_LENGTHS[(ci >> 5) as usize];
        subfield_sum += len;
        cis.push((app, len));
    }

    if subfield_sum + ci_bytes != xpad.len() {
        return Err(DabError::pad(format!(
            "X-PAD length {} does not match content indicators ({} + {})",
            xpad.len(),
            subfield_sum,
            ci_bytes
        )));
    }

    let mut offset = ci_bytes;
    Ok(cis
        .into_iter()
        .map(|(app_type, len)| {
            let data = xpad[offset..offset + len].to_vec();
            offset += len;
            XPadSubfield { app_type, data }
        })
        .collect())
}

fn length_index(len: usize) -> Result<u8> {
    XPAD_SUBFIELD_LENGTHS
        .iter()
        .position(|&l| l >= len)
        .map(|i| i as u8)
        .ok_or_else(|| DabError::pad(format!("X-PAD subfield of {} bytes too long", len)))
}

/// Build a PAD field (reversed X-PAD followed by F-PAD) from subfields.
/// Subfield data is zero padded up to the next allowed length.
pub fn build_variable_pad(subfields: &[XPadSubfield]) -> Result<Vec<u8>> {
    if subfields.is_empty() || subfields.len() > MAX_CONTENT_INDICATORS {
        return Err(DabError::pad(format!(
            "{} subfields, a variable X-PAD carries 1..{}",
            subfields.len(),
            MAX_CONTENT_INDICATORS
        )));
    }
    let mut cis = Vec::with_capacity(MAX_CONTENT_INDICATORS);
    let mut body = Vec::new();
    for subfield in subfields {
        let index = length_index(subfield.data.len())?;
        cis.push((index << 5) | (subfield.app_type & 0x1f));
        let start = body.len();
        body.extend_from_slice(&subfield.data);
        body.resize(start + XPAD_SUBFIELD_LENGTHS[index as usize], 0);
    }
    if cis.len() < MAX_CONTENT_INDICATORS {
        cis.push(app_type::END_MARKER);
    }

    let mut pad: Vec<u8> = cis.into_iter().chain(body).collect();
    pad.reverse();
    let fpad = FPad {
        xpad: XPadKind::Variable,
        ci_flag: true,
    };
    pad.extend_from_slice(&fpad.to_bytes());
    Ok(pad)
}

/// PAD without X-PAD, only the F-PAD bytes
pub fn empty_pad() -> Vec<u8> {
    FPad {
        xpad: XPadKind::None,
        ci_flag: false,
    }
    .to_bytes()
    .to_vec()
}

/// Data group length indicator subfield: 14 bit length and CRC16
pub fn data_group_length_indicator(length: usize) -> Vec<u8> {
    let mut field = vec![((length >> 8) & 0x3f) as u8, (length & 0xff) as u8];
    append_crc16(&mut field);
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fpad_bits() {
        let pad = [0x00, 0x20, 0x02];
        let fpad = FPad::parse(&pad).unwrap();
        assert_eq!(fpad.xpad, XPadKind::Variable);
        assert!(fpad.ci_flag);
        assert_eq!(fpad.to_bytes(), [0x20, 0x02]);
        assert!(FPad::parse(&[0x20]).is_none());
    }

    #[test]
    fn test_reversed_layout() {
        let subfields = vec![XPadSubfield {
            app_type: app_type::DYNAMIC_LABEL_START,
            data: vec![1, 2, 3, 4],
        }];
        let pad = build_variable_pad(&subfields).unwrap();
        // 4 data bytes + CI + end marker + F-PAD, data reversed at the front
        assert_eq!(pad, vec![4, 3, 2, 1, 0x00, 0x02, 0x20, 0x02]);
        assert_eq!(parse_variable_xpad(&pad).unwrap(), subfields);
    }

    #[test]
    fn test_four_cis_without_end_marker() {
        let subfields: Vec<XPadSubfield> = (0..4)
            .map(|i| XPadSubfield {
                app_type: app_type::MOT_CONTINUATION,
                data: vec![i; 6],
            })
            .collect();
        let pad = build_variable_pad(&subfields).unwrap();
        assert_eq!(pad.len(), 4 * 6 + 4 + 2);
        assert_eq!(parse_variable_xpad(&pad).unwrap(), subfields);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut pad = build_variable_pad(&[XPadSubfield {
            app_type: app_type::MOT_START,
            data: vec![9; 8],
        }])
        .unwrap();
        pad.insert(0, 0xAA);
        assert!(parse_variable_xpad(&pad).is_err());
    }

    #[test]
    fn test_subfield_padding() {
        let pad = build_variable_pad(&[XPadSubfield {
            app_type: app_type::MOT_START,
            data: vec![7; 10],
        }])
        .unwrap();
        let parsed = parse_variable_xpad(&pad).unwrap();
        assert_eq!(parsed[0].data.len(), 12);
        assert_eq!(&parsed[0].data[10..], &[0, 0]);
    }

    #[test]
    fn test_length_indicator_crc() {
        let field = data_group_length_indicator(300);
        assert_eq!(field.len(), 4);
        assert_eq!(((field[0] as usize & 0x3f) << 8) | field[1] as usize, 300);
        assert!(crate::error_correction::crc::verify_crc16(&field));
    }
}
