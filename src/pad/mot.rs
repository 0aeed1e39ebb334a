//! MSC data groups and Multimedia Object Transfer (ETSI EN 301 234).

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::dynamic_label::decode_text;
use crate::error_correction::crc::{append_crc16, verify_crc16};

pub const DATA_GROUP_TYPE_MOT_HEADER: u8 = 3;
pub const DATA_GROUP_TYPE_MOT_BODY: u8 = 4;

const PARAM_CONTENT_NAME: u8 = 0x0C;
const HEADER_CORE_LEN: usize = 7;
const MAX_SEGMENT_SIZE: usize = 0x1fff;

/// A completely received MOT object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MotObject {
    pub transport_id: u16,
    pub content_type: u8,
    pub content_subtype: u16,
    pub content_name: Option<String>,
    pub body: Vec<u8>,
}

/// Parsed MOT header core plus the parameters we use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotHeader {
    pub body_size: usize,
    pub header_size: usize,
    pub content_type: u8,
    pub content_subtype: u16,
    pub content_name: Option<String>,
}

impl MotHeader {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_CORE_LEN {
            return None;
        }
        let body_size = ((data[0] as usize) << 20)
            | ((data[1] as usize) << 12)
            | ((data[2] as usize) << 4)
            | ((data[3] as usize) >> 4);
        let header_size = (((data[3] & 0x0f) as usize) << 9)
            | ((data[4] as usize) << 1)
            | ((data[5] as usize) >> 7);
        let content_type = (data[5] & 0x7e) >> 1;
        let content_subtype = (((data[5] & 0x01) as u16) << 8) | data[6] as u16;

        let mut content_name = None;
        let end = header_size.min(data.len());
        let mut offset = HEADER_CORE_LEN;
        while offset < end {
            let pli = data[offset] >> 6;
            let param_id = data[offset] & 0x3f;
            offset += 1;
            let len = match pli {
                0 => 0,
                1 => 1,
                2 => 4,
                _ => {
                    let indicator = *data.get(offset)?;
                    if indicator & 0x80 != 0 {
                        let low = *data.get(offset + 1)?;
                        offset += 2;
                        (((indicator & 0x7f) as usize) << 8) | low as usize
                    } else {
                        offset += 1;
                        (indicator & 0x7f) as usize
                    }
                }
            };
            let value = data.get(offset..offset + len)?;
            if param_id == PARAM_CONTENT_NAME && !value.is_empty() {
                content_name = Some(decode_text(value[0] >> 4, &value[1..]));
            }
            offset += len;
        }

        Some(Self {
            body_size,
            header_size,
            content_type,
            content_subtype,
            content_name,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut extension = Vec::new();
        if let Some(name) = &self.content_name {
            let len = name.len() + 1;
            extension.push(0xC0 | PARAM_CONTENT_NAME);
            if len > 0x7f {
                extension.push(0x80 | ((len >> 8) as u8 & 0x7f));
                extension.push(len as u8);
            } else {
                extension.push(len as u8);
            }
            // ISO Latin-1 indicator
            extension.push(0x40);
            extension.extend_from_slice(name.as_bytes());
        }
        let header_size = HEADER_CORE_LEN + extension.len();
        let body = self.body_size & 0x0fff_ffff;
        let mut out = vec![
            (body >> 20) as u8,
            (body >> 12) as u8,
            (body >> 4) as u8,
            (((body & 0x0f) as u8) << 4) | ((header_size >> 9) as u8 & 0x0f),
            (header_size >> 1) as u8,
            (((header_size & 0x01) as u8) << 7)
                | ((self.content_type & 0x3f) << 1)
                | ((self.content_subtype >> 8) as u8 & 0x01),
            self.content_subtype as u8,
        ];
        out.extend(extension);
        out
    }
}

/// Fields of an MSC data group that MOT reception needs
#[derive(Debug, Clone, PartialEq, Eq)]
struct DataGroupSegment<'a> {
    group_type: u8,
    last: bool,
    segment_number: u16,
    transport_id: u16,
    data: &'a [u8],
}

enum ParseOutcome<'a> {
    Segment(DataGroupSegment<'a>),
    Skip,
    Abort,
}

fn parse_data_group(group: &[u8]) -> ParseOutcome<'_> {
    if group.len() < 4 {
        return ParseOutcome::Skip;
    }
    let extension = (group[0] >> 7) & 1 == 1;
    let crc_flag = (group[0] >> 6) & 1 == 1;
    let segment_flag = (group[0] >> 5) & 1 == 1;
    let user_access = (group[0] >> 4) & 1 == 1;
    let group_type = group[0] & 0x0f;

    if !crc_flag {
        trace!("MSC data group without CRC ignored");
        return ParseOutcome::Skip;
    }
    if !verify_crc16(group) {
        debug!("MSC data group CRC failed");
        return ParseOutcome::Skip;
    }
    if !segment_flag {
        debug!("MSC data group without segment field dropped");
        return ParseOutcome::Skip;
    }

    let end = group.len() - 2;
    let mut offset = 2 + if extension { 2 } else { 0 };
    let Some(field) = group.get(offset..offset + 2) else {
        return ParseOutcome::Skip;
    };
    let last = field[0] & 0x80 != 0;
    let segment_number = (((field[0] & 0x7f) as u16) << 8) | field[1] as u16;
    offset += 2;

    let mut transport_id = 0;
    if user_access {
        let Some(&ua) = group.get(offset) else {
            return ParseOutcome::Skip;
        };
        let length = (ua & 0x0f) as usize;
        if length < 2 {
            warn!(
                "MSC data group: user access length indicator {} below 2",
                length
            );
            return ParseOutcome::Abort;
        }
        let Some(id) = group.get(offset + 1..offset + 3) else {
            return ParseOutcome::Skip;
        };
        transport_id = u16::from_be_bytes([id[0], id[1]]);
        offset += length + 1;
    }

    let Some(seg_header) = group.get(offset..offset + 2) else {
        return ParseOutcome::Skip;
    };
    let segment_size = (((seg_header[0] & 0x1f) as usize) << 8) | seg_header[1] as usize;
    offset += 2;
    if offset > end || end - offset != segment_size {
        warn!(
            "MSC data group: segment size {} does not match data field of {} bytes",
            segment_size,
            end.saturating_sub(offset)
        );
        return ParseOutcome::Abort;
    }

    ParseOutcome::Segment(DataGroupSegment {
        group_type,
        last,
        segment_number,
        transport_id,
        data: &group[offset..end],
    })
}

struct BodyReception {
    transport_id: u16,
    header: MotHeader,
    body: Vec<u8>,
    next_segment: u16,
}

/// MOT object reassembly from MSC data groups.
#[derive(Default)]
pub struct MotDecoder {
    header_id: Option<u16>,
    header_buf: Vec<u8>,
    header_next: u16,
    body: Option<BodyReception>,
    aborted: usize,
}

impl MotDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_data_group(&mut self, group: &[u8]) -> Option<MotObject> {
        let segment = match parse_data_group(group) {
            ParseOutcome::Segment(s) => s,
            ParseOutcome::Skip => return None,
            ParseOutcome::Abort => {
                self.abort();
                return None;
            }
        };
        match segment.group_type {
            DATA_GROUP_TYPE_MOT_HEADER => {
                self.header_segment(&segment);
                None
            }
            DATA_GROUP_TYPE_MOT_BODY => self.body_segment(&segment),
            other => {
                debug!("MSC data group type {} not supported", other);
                None
            }
        }
    }

    fn header_segment(&mut self, segment: &DataGroupSegment) {
        if segment.segment_number == 0 {
            self.header_id = Some(segment.transport_id);
            self.header_buf.clear();
            self.header_next = 0;
        }
        if self.header_id != Some(segment.transport_id) || segment.segment_number != self.header_next
        {
            debug!(
                "MOT header segment {} of transport {} out of order",
                segment.segment_number, segment.transport_id
            );
            self.header_id = None;
            return;
        }
        self.header_buf.extend_from_slice(segment.data);
        self.header_next += 1;
        if !segment.last {
            return;
        }

        self.header_id = None;
        match MotHeader::parse(&self.header_buf) {
            Some(header) => {
                debug!(
                    "MOT header: transport {}, body {} bytes, type {}/{}",
                    segment.transport_id,
                    header.body_size,
                    header.content_type,
                    header.content_subtype
                );
                self.body = Some(BodyReception {
                    transport_id: segment.transport_id,
                    // grows with the segments, the announced size is untrusted
                    body: Vec::with_capacity(header.body_size.min(MAX_SEGMENT_SIZE)),
                    header,
                    next_segment: 0,
                });
            }
            None => warn!("MOT header of transport {} malformed", segment.transport_id),
        }
    }

    fn body_segment(&mut self, segment: &DataGroupSegment) -> Option<MotObject> {
        let reception = self.body.as_mut()?;
        if reception.transport_id != segment.transport_id {
            trace!(
                "MOT body of transport {} while waiting for {}",
                segment.transport_id, reception.transport_id
            );
            return None;
        }
        if segment.segment_number != reception.next_segment {
            warn!(
                "MOT body segment {} missing, got {}",
                reception.next_segment, segment.segment_number
            );
            self.abort();
            return None;
        }
        if reception.body.len() + segment.data.len() > reception.header.body_size {
            warn!(
                "MOT body of transport {} exceeds the announced {} bytes",
                reception.transport_id, reception.header.body_size
            );
            self.abort();
            return None;
        }
        reception.body.extend_from_slice(segment.data);
        reception.next_segment += 1;
        if !segment.last {
            return None;
        }

        let reception = self.body.take()?;
        if reception.body.len() != reception.header.body_size {
            warn!(
                "MOT body of {} bytes, header announced {}",
                reception.body.len(),
                reception.header.body_size
            );
            return None;
        }
        info!(
            "MOT object {} complete: {} bytes{}",
            reception.transport_id,
            reception.body.len(),
            reception
                .header
                .content_name
                .as_deref()
                .map(|n| format!(" ({})", n))
                .unwrap_or_default()
        );
        Some(MotObject {
            transport_id: reception.transport_id,
            content_type: reception.header.content_type,
            content_subtype: reception.header.content_subtype,
            content_name: reception.header.content_name,
            body: reception.body,
        })
    }

    fn abort(&mut self) {
        self.aborted += 1;
        self.header_id = None;
        self.header_buf.clear();
        self.body = None;
    }

    pub fn aborted(&self) -> usize {
        self.aborted
    }
}

/// Build one MSC data group carrying a MOT segment
pub fn build_data_group(
    group_type: u8,
    transport_id: u16,
    segment_number: u16,
    last: bool,
    payload: &[u8],
) -> Vec<u8> {
    let mut group = vec![
        // no extension, CRC, segment field, user access
        0b0111_0000 | (group_type & 0x0f),
        (segment_number as u8 & 0x0f) << 4,
        ((last as u8) << 7) | ((segment_number >> 8) as u8 & 0x7f),
        segment_number as u8,
        // transport id flag, two byte length
        0b0001_0010,
    ];
    group.extend_from_slice(&transport_id.to_be_bytes());
    let size = payload.len().min(MAX_SEGMENT_SIZE);
    group.push((size >> 8) as u8 & 0x1f);
    group.push(size as u8);
    group.extend_from_slice(&payload[..size]);
    append_crc16(&mut group);
    group
}

/// Data groups transporting `object`: header first, then body segments
pub fn encode_object(object: &MotObject, segment_size: usize) -> Vec<Vec<u8>> {
    let segment_size = segment_size.clamp(1, MAX_SEGMENT_SIZE);
    let header = MotHeader {
        body_size: object.body.len(),
        header_size: 0,
        content_type: object.content_type,
        content_subtype: object.content_subtype,
        content_name: object.content_name.clone(),
    };
    let mut groups = vec![build_data_group(
        DATA_GROUP_TYPE_MOT_HEADER,
        object.transport_id,
        0,
        true,
        &header.to_bytes(),
    )];
    let chunks: Vec<&[u8]> = object.body.chunks(segment_size).collect();
    let count = chunks.len();
    for (i, chunk) in chunks.into_iter().enumerate() {
        groups.push(build_data_group(
            DATA_GROUP_TYPE_MOT_BODY,
            object.transport_id,
            i as u16,
            i + 1 == count,
            chunk,
        ));
    }
    groups
}
