//! Programme Associated Data carried inside DAB+ access units.

pub mod data_group;
pub mod dynamic_label;
pub mod mot;
pub mod xpad;

use serde::Serialize;
use tracing::{debug, error, trace};

pub use data_group::DataGroupAssembler;
pub use dynamic_label::DynamicLabelDecoder;
pub use mot::{MotDecoder, MotObject};
pub use xpad::{FPad, XPadKind, XPadSubfield};

use xpad::app_type;

/// Something a receiver would present to the listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PadEvent {
    DynamicLabel { charset: u8, text: String },
    ClearDisplay,
    MotObject(MotObject),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PadStats {
    pub pads: usize,
    pub rejected: usize,
    pub unsupported: usize,
}

/// Decodes the PAD field of every access unit of one service.
#[derive(Default)]
pub struct PadDecoder {
    label: DynamicLabelDecoder,
    data_group: DataGroupAssembler,
    mot: MotDecoder,
    stats: PadStats,
}

impl PadDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, pad: &[u8]) -> Vec<PadEvent> {
        let mut events = Vec::new();
        let Some(fpad) = FPad::parse(pad) else {
            return events;
        };
        self.stats.pads += 1;

        if !fpad.ci_flag {
            trace!("X-PAD without content indicator not supported");
            self.stats.unsupported += 1;
            return events;
        }
        match fpad.xpad {
            XPadKind::Variable => {}
            XPadKind::None => return events,
            kind => {
                debug!("{:?} X-PAD not supported", kind);
                self.stats.unsupported += 1;
                return events;
            }
        }

        let subfields = match xpad::parse_variable_xpad(pad) {
            Ok(s) => s,
            Err(e) => {
                error!("{}", e);
                self.stats.rejected += 1;
                return events;
            }
        };

        for subfield in subfields {
            let data = subfield.data.as_slice();
            match subfield.app_type {
                app_type::DATA_GROUP_LENGTH => self.data_group.length_indicator(data),
                app_type::DYNAMIC_LABEL_START => events.extend(self.label.start(data)),
                app_type::DYNAMIC_LABEL_CONTINUATION => {
                    events.extend(self.label.continuation(data))
                }
                app_type::MOT_START => {
                    if let Some(group) = self.data_group.start(data) {
                        events.extend(self.mot.process_data_group(&group).map(PadEvent::MotObject));
                    }
                }
                app_type::MOT_CONTINUATION => {
                    if let Some(group) = self.data_group.continuation(data) {
                        events.extend(self.mot.process_data_group(&group).map(PadEvent::MotObject));
                    }
                }
                other => trace!("X-PAD application type {} ignored", other),
            }
        }
        events
    }

    pub fn stats(&self) -> &PadStats {
        &self.stats
    }
}

/// Turns labels and MOT objects into a queue of PAD fields, one per AU.
#[derive(Debug, Default)]
pub struct PadEncoder {
    queue: std::collections::VecDeque<Vec<XPadSubfield>>,
    max_subfield: usize,
}

impl PadEncoder {
    /// `max_subfield` bounds every X-PAD subfield (at most 48 bytes)
    pub fn new(max_subfield: usize) -> Self {
        Self {
            queue: Default::default(),
            max_subfield: max_subfield.clamp(4, 48),
        }
    }

    pub fn push_label(&mut self, text: &str, charset: u8, toggle: bool) {
        for segment in dynamic_label::encode_label(text, charset, toggle) {
            self.push_chunked(
                &segment,
                app_type::DYNAMIC_LABEL_START,
                app_type::DYNAMIC_LABEL_CONTINUATION,
                Vec::new(),
            );
        }
    }

    pub fn push_clear_display(&mut self, toggle: bool) {
        self.queue.push_back(vec![XPadSubfield {
            app_type: app_type::DYNAMIC_LABEL_START,
            data: dynamic_label::clear_display_segment(toggle),
        }]);
    }

    pub fn push_mot_object(&mut self, object: &MotObject, segment_size: usize) {
        for group in mot::encode_object(object, segment_size) {
            let indicator = XPadSubfield {
                app_type: app_type::DATA_GROUP_LENGTH,
                data: xpad::data_group_length_indicator(group.len()),
            };
            self.push_chunked(
                &group,
                app_type::MOT_START,
                app_type::MOT_CONTINUATION,
                vec![indicator],
            );
        }
    }

    fn push_chunked(&mut self, data: &[u8], start: u8, continuation: u8, lead: Vec<XPadSubfield>) {
        let mut first = lead;
        for (i, chunk) in data.chunks(self.max_subfield).enumerate() {
            let subfield = XPadSubfield {
                app_type: if i == 0 { start } else { continuation },
                data: chunk.to_vec(),
            };
            if i == 0 {
                first.push(subfield);
                self.queue.push_back(std::mem::take(&mut first));
            } else {
                self.queue.push_back(vec![subfield]);
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// PAD field for the next AU, `None` once everything was sent
    pub fn next_pad(&mut self) -> Option<Vec<u8>> {
        let subfields = self.queue.pop_front()?;
        match xpad::build_variable_pad(&subfields) {
            Ok(pad) => Some(pad),
            Err(e) => {
                error!("PAD encoding failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(encoder: &mut PadEncoder) -> Vec<PadEvent> {
        let mut decoder = PadDecoder::new();
        let mut events = Vec::new();
        while let Some(pad) = encoder.next_pad() {
            events.extend(decoder.process(&pad));
        }
        events
    }

    #[test]
    fn test_label_through_pad() {
        let mut encoder = PadEncoder::new(8);
        encoder.push_label("Hello DAB+ world, this is PAD", dynamic_label::CHARSET_UTF8, false);
        encoder.push_clear_display(true);
        let events = run(&mut encoder);
        assert_eq!(
            events,
            vec![
                PadEvent::DynamicLabel {
                    charset: dynamic_label::CHARSET_UTF8,
                    text: "Hello DAB+ world, this is PAD".to_string()
                },
                PadEvent::ClearDisplay
            ]
        );
    }

    #[test]
    fn test_mot_through_pad() {
        let object = MotObject {
            transport_id: 7,
            content_type: 2,
            content_subtype: 3,
            content_name: Some("logo.png".to_string()),
            body: (0..150u8).collect(),
        };
        let mut encoder = PadEncoder::new(24);
        encoder.push_mot_object(&object, 50);
        let events = run(&mut encoder);
        assert_eq!(events, vec![PadEvent::MotObject(object)]);
    }

    #[test]
    fn test_fpad_only() {
        let mut decoder = PadDecoder::new();
        assert!(decoder.process(&xpad::empty_pad()).is_empty());
        assert_eq!(decoder.stats().unsupported, 1);
    }

    #[test]
    fn test_corrupt_ci_list_rejected() {
        let mut decoder = PadDecoder::new();
        let mut pad = xpad::build_variable_pad(&[XPadSubfield {
            app_type: app_type::DYNAMIC_LABEL_START,
            data: vec![0; 6],
        }])
        .unwrap();
        pad.remove(0);
        assert!(decoder.process(&pad).is_empty());
        assert_eq!(decoder.stats().rejected, 1);
    }
}
