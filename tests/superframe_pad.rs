//! Superframes carrying PAD: build, damage, firecode check and decode.

use dabmsc_rs::pad::xpad::empty_pad;
use dabmsc_rs::pad::{MotObject, PadEncoder, PadEvent};
use dabmsc_rs::pad::dynamic_label::CHARSET_UTF8;
use dabmsc_rs::superframe::{AudioFormat, FirecodeChecker, SuperframeBuilder, SuperframeDecoder};

const N: usize = 15;

fn slideshow() -> MotObject {
    MotObject {
        transport_id: 0x1234,
        content_type: 2,
        content_subtype: 1,
        content_name: Some("cover.jpg".to_string()),
        body: (0..400u32).map(|i| (i * 7 % 256) as u8).collect(),
    }
}

/// Logical frames of as many superframes as the queued PAD needs
fn transmit(encoder: &mut PadEncoder, format: AudioFormat) -> Vec<Vec<u8>> {
    let builder = SuperframeBuilder::new(N, format);
    let mut frames = Vec::new();
    while encoder.pending() > 0 {
        let payloads: Vec<Vec<u8>> = builder
            .au_payload_sizes()
            .into_iter()
            .map(|len| {
                let pad = encoder.next_pad().unwrap_or_else(empty_pad);
                SuperframeBuilder::au_with_pad(&pad, len, &[0x11, 0x22])
            })
            .collect();
        frames.extend(builder.build(&payloads, &[]).unwrap());
    }
    frames
}

#[test]
fn test_label_and_slideshow_survive_byte_errors() {
    let mut encoder = PadEncoder::new(16);
    encoder.push_label("Now playing: test tone", CHARSET_UTF8, false);
    encoder.push_mot_object(&slideshow(), 64);
    let frames = transmit(&mut encoder, AudioFormat::from_byte(0b0101_0000));
    assert_eq!(frames.len() % 5, 0);

    // two leading frames of the previous superframe
    let mut checker = FirecodeChecker::new(N);
    let mut superframes = Vec::new();
    for junk in 0..2u8 {
        superframes.extend(checker.push(&vec![junk.wrapping_mul(91) | 1; 24 * N]).unwrap());
    }
    for frame in &frames {
        superframes.extend(checker.push(frame).unwrap());
    }
    assert_eq!(superframes.len(), frames.len() / 5);
    assert_eq!(checker.report().ok_frames.first(), Some(&2));

    let mut decoder = SuperframeDecoder::new(N);
    let mut events = Vec::new();
    for (i, superframe) in superframes.iter_mut().enumerate() {
        // a few byte errors per superframe, spread over different RS columns
        for k in 0..3 {
            let pos = 100 + i * 11 + k * 257;
            superframe[pos] ^= 0xa5;
        }
        let decoded = decoder.decode(superframe).unwrap();
        assert_eq!(decoded.au_crc_errors, 0);
        assert_eq!(decoded.access_units.len(), 6);
        events.extend(decoded.pad_events);
    }

    assert!(decoder.stats().rs_corrected_bytes >= 3 * superframes.len());
    assert_eq!(decoder.stats().rs_uncorrectable, 0);
    assert!(events.contains(&PadEvent::DynamicLabel {
        charset: CHARSET_UTF8,
        text: "Now playing: test tone".to_string(),
    }));
    assert!(events.contains(&PadEvent::MotObject(slideshow())));
}

#[test]
fn test_sbr_format_has_three_aus() {
    let mut encoder = PadEncoder::new(8);
    encoder.push_label("SBR", CHARSET_UTF8, true);
    let format = AudioFormat::from_byte(0b0110_0000);
    let frames = transmit(&mut encoder, format);
    let superframe = frames[..5].concat();

    let mut decoder = SuperframeDecoder::new(N);
    let decoded = decoder.decode(&superframe).unwrap();
    assert_eq!(decoded.format, format);
    assert_eq!(decoded.access_units.len(), 3);
    assert_eq!(decoded.format.sample_rate(), 48_000);
    assert_eq!(decoded.format.core_sample_rate(), 24_000);
}
