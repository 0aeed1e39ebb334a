//! End to end: synthesise a 120 kbit/s DAB+ service in mode I and run the
//! file based receiver over it.

use std::path::Path;

use dabmsc_rs::pad::PadEvent;
use dabmsc_rs::synth::{SynthConfig, TransmissionSynth};
use dabmsc_rs::utils::consts::{
    CHECKED_FIRECODE_FILE, MSC_SUBCHANNEL_DEBUG_FILE, TRANSMISSION_FRAME_FILE,
    TRANSMISSION_TRIGGER_FILE,
};
use dabmsc_rs::{MscFlowgraph, ReceiverConfig};

const SUPERFRAME_BYTES: usize = 5 * 24 * 15;

fn synthesise(dir: &Path, config: SynthConfig) -> Vec<u8> {
    let mut synth = TransmissionSynth::new(config).unwrap();
    let summary = synth.write_to(dir, None).unwrap();
    assert_eq!(summary.transmission_frames, 12);
    assert_eq!(summary.logical_frames, 48);
    std::fs::read(summary.superframe_file.unwrap()).unwrap()
}

fn receiver(dir: &Path) -> ReceiverConfig {
    ReceiverConfig {
        debug_dir: dir.to_path_buf(),
        decode_superframes: true,
        verbose: false,
        ..ReceiverConfig::default()
    }
}

#[test]
fn test_harness_cadence() {
    let dir = tempfile::tempdir().unwrap();
    let sent = synthesise(
        dir.path(),
        SynthConfig {
            label: Some("Hello DAB+".to_string()),
            ..SynthConfig::default()
        },
    );

    let summary = MscFlowgraph::new(receiver(dir.path())).run().unwrap();

    assert_eq!(summary.msc.transmission_frames, 12);
    assert_eq!(summary.msc.cifs, 48);
    // the first 15 CIFs only fill the time deinterleaver
    assert_eq!(summary.msc.logical_frames, 33);

    let firecode = &summary.firecode;
    assert_eq!(firecode.ok_frames, vec![0, 5, 10, 15, 20, 25]);
    assert!(firecode.follows_superframe_cadence());
    assert_eq!(firecode.frames_dropped, 0);

    let output = std::fs::read(dir.path().join(CHECKED_FIRECODE_FILE)).unwrap();
    assert_eq!(output.len(), 6 * SUPERFRAME_BYTES);
    assert_eq!(summary.bytes_written, output.len());
    assert_eq!(output, sent[..output.len()]);

    let taps = std::fs::metadata(dir.path().join(MSC_SUBCHANNEL_DEBUG_FILE)).unwrap();
    assert_eq!(taps.len() as usize, 48 * 90 * 64 * 4);

    let stats = summary.superframes.unwrap();
    assert_eq!(stats.superframes, 6);
    assert_eq!(stats.au_crc_errors, 0);
    assert_eq!(summary.audio_format.map(|f| f.num_aus()), Some(6));
    assert!(summary.pad_events.iter().any(|event| matches!(
        event,
        PadEvent::DynamicLabel { text, .. } if text == "Hello DAB+"
    )));
}

#[test]
fn test_noisy_dqpsk_channel() {
    let dir = tempfile::tempdir().unwrap();
    let sent = synthesise(
        dir.path(),
        SynthConfig {
            dqpsk: true,
            noise_sigma: 0.2,
            seed: 7,
            ..SynthConfig::default()
        },
    );

    let mut config = receiver(dir.path());
    config.debug = false;
    let summary = MscFlowgraph::new(config).run().unwrap();

    assert!(summary.firecode.follows_superframe_cadence());
    assert_eq!(summary.firecode.first_sync(), Some(0));
    let output = std::fs::read(dir.path().join(CHECKED_FIRECODE_FILE)).unwrap();
    assert_eq!(output, sent[..output.len()]);
}

#[test]
fn test_join_mid_stream() {
    let dir = tempfile::tempdir().unwrap();
    let sent = synthesise(dir.path(), SynthConfig::default());

    // start ten symbols into the second transmission frame
    let skip = 75 + 10;
    let frames = std::fs::read(dir.path().join(TRANSMISSION_FRAME_FILE)).unwrap();
    let triggers = std::fs::read(dir.path().join(TRANSMISSION_TRIGGER_FILE)).unwrap();
    let late = dir.path().join("late");
    std::fs::create_dir_all(&late).unwrap();
    std::fs::write(late.join(TRANSMISSION_FRAME_FILE), &frames[skip * 3072 * 4..]).unwrap();
    std::fs::write(late.join(TRANSMISSION_TRIGGER_FILE), &triggers[skip..]).unwrap();

    let summary = MscFlowgraph::new(receiver(&late)).run().unwrap();

    // the first two transmission frames are lost, decoding resumes at CIF 8
    assert_eq!(summary.msc.transmission_frames, 10);
    assert_eq!(summary.msc.logical_frames, 40 - 15);
    // decoded frame 0 is sent frame 8, the next superframe starts at 10
    assert_eq!(summary.firecode.first_sync(), Some(2));
    assert!(summary.firecode.follows_superframe_cadence());
    assert_eq!(summary.firecode.frames_dropped, 2);
    assert_eq!(summary.firecode.superframes, 4);

    let output = std::fs::read(late.join(CHECKED_FIRECODE_FILE)).unwrap();
    assert!(!output.is_empty());
    assert_eq!(output, sent[2 * SUPERFRAME_BYTES..2 * SUPERFRAME_BYTES + output.len()]);
}

#[test]
fn test_config_round_trip_drives_the_graph() {
    let dir = tempfile::tempdir().unwrap();
    synthesise(dir.path(), SynthConfig::default());

    let toml = receiver(dir.path()).to_toml_string().unwrap();
    let config = ReceiverConfig::from_toml_str(&toml).unwrap();
    let summary = MscFlowgraph::new(config).run().unwrap();
    assert_eq!(summary.firecode.superframes, 6);
}
