//! Test signal generator: a DAB+ service encoded all the way down to the
//! demodulated symbol stream the receiver reads.
//!
//! Each transmission frame is written as `symbols_per_frame` vectors of
//! `2K` soft bits plus one trigger byte per vector (1 on the first).

use num_complex::Complex32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::dqpsk::{DifferentialDemodulator, PhasorSummer, qpsk_map};
use crate::flowgraph::io::{ByteFileSink, VectorFileSink};
use crate::msc::MscEncoder;
use crate::pad::PadEncoder;
use crate::pad::dynamic_label::CHARSET_UTF8;
use crate::params::{DabMode, DabParameters, Subchannel};
use crate::superframe::{AudioFormat, SuperframeBuilder};
use crate::ui::progress::{ProgressManager, templates};
use crate::utils::config::ReceiverConfig;
use crate::utils::consts::{CHECKED_FIRECODE_FILE, TRANSMISSION_FRAME_FILE, TRANSMISSION_TRIGGER_FILE};
use crate::utils::error::{DabError, Result};

/// 48 kHz AAC-LC stereo, six AUs per superframe
pub const DEFAULT_FORMAT_BYTE: u8 = 0b0101_0000;

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub mode: DabMode,
    pub subchannel: Subchannel,
    pub transmission_frames: usize,
    pub format: AudioFormat,
    /// Standard deviation of the additive Gaussian noise, 0 disables it
    pub noise_sigma: f32,
    /// Pass the bits through QPSK mapping, phasor summing and differential
    /// demodulation instead of writing them as +-1 directly
    pub dqpsk: bool,
    pub label: Option<String>,
    pub seed: u64,
}

impl SynthConfig {
    /// Matches what `config` expects to receive
    pub fn for_receiver(config: &ReceiverConfig) -> Result<Self> {
        Ok(Self {
            mode: DabMode::from_number(config.mode)?,
            subchannel: config.subchannel()?,
            ..Self::default()
        })
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        let config = ReceiverConfig::default();
        Self {
            mode: DabMode::I,
            subchannel: Subchannel {
                start_address: config.subchannel.address,
                size: config.subchannel.size,
                protection: crate::params::Protection::EepA(3),
            },
            transmission_frames: 12,
            format: AudioFormat::from_byte(DEFAULT_FORMAT_BYTE),
            noise_sigma: 0.0,
            dqpsk: false,
            label: None,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SynthSummary {
    pub transmission_frames: usize,
    pub symbols: usize,
    pub logical_frames: usize,
    pub superframes: usize,
    /// Reference copy of every superframe that was sent
    pub superframe_file: Option<PathBuf>,
}

/// Produces transmission frames for one subchannel. Everything outside
/// the subchannel is filled with random bits.
pub struct TransmissionSynth {
    config: SynthConfig,
    params: DabParameters,
    builder: SuperframeBuilder,
    encoder: MscEncoder,
    pad: PadEncoder,
    rng: StdRng,
    noise: Option<Normal<f32>>,
    pending: VecDeque<Vec<u8>>,
    sent_superframes: Vec<Vec<u8>>,
    summer: PhasorSummer,
    demod: DifferentialDemodulator,
    logical_frames: usize,
}

impl TransmissionSynth {
    pub fn new(config: SynthConfig) -> Result<Self> {
        let params = DabParameters::new(config.mode, 0.0);
        let subchannel = config.subchannel;
        if config.transmission_frames == 0 {
            return Err(DabError::config("nothing to synthesise"));
        }
        let noise = Normal::new(0.0, config.noise_sigma).map_err(|e| {
            DabError::config(format!("noise sigma {}: {}", config.noise_sigma, e))
        })?;
        let k = params.num_carriers;
        Ok(Self {
            noise: (config.noise_sigma > 0.0).then_some(noise),
            builder: SuperframeBuilder::new(subchannel.bit_rate_n(), config.format),
            encoder: MscEncoder::new(subchannel),
            pad: PadEncoder::new(16),
            rng: StdRng::seed_from_u64(config.seed),
            pending: VecDeque::new(),
            sent_superframes: Vec::new(),
            summer: PhasorSummer::new(k),
            demod: DifferentialDemodulator::new(k),
            logical_frames: 0,
            params,
            config,
        })
    }

    pub fn params(&self) -> &DabParameters {
        &self.params
    }

    /// Superframes built so far, in transmission order
    pub fn sent_superframes(&self) -> &[Vec<u8>] {
        &self.sent_superframes
    }

    fn next_pad(&mut self) -> Option<Vec<u8>> {
        let label = self.config.label.as_ref()?;
        if self.pad.pending() == 0 {
            self.pad.push_label(label, CHARSET_UTF8, false);
        }
        self.pad.next_pad()
    }

    fn build_superframe(&mut self) -> Result<()> {
        let sizes = self.builder.au_payload_sizes();
        let mut payloads = Vec::with_capacity(sizes.len());
        for len in sizes {
            let mut fill: Vec<u8> = (0..len).map(|_| self.rng.random()).collect();
            // keep the raw payload from looking like a data stream element
            if let Some(first) = fill.first_mut() {
                *first &= 0x1f;
            }
            let payload = match self.next_pad() {
                Some(pad) => SuperframeBuilder::au_with_pad(&pad, len, &fill),
                None => fill,
            };
            payloads.push(payload);
        }
        let frames = self.builder.build(&payloads, &[])?;
        self.sent_superframes.push(frames.concat());
        self.pending.extend(frames);
        Ok(())
    }

    fn next_logical_frame(&mut self) -> Result<Vec<u8>> {
        if self.pending.is_empty() {
            self.build_superframe()?;
        }
        self.logical_frames += 1;
        self.pending
            .pop_front()
            .ok_or_else(|| DabError::superframe("superframe builder produced no frames"))
    }

    fn random_bits(&mut self, count: usize) -> Vec<u8> {
        (0..count).map(|_| self.rng.random_range(0..=1u8)).collect()
    }

    fn noise_sample(&mut self) -> f32 {
        match self.noise {
            Some(noise) => noise.sample(&mut self.rng),
            None => 0.0,
        }
    }

    /// Hard bits of one transmission frame, FIC first
    fn frame_bits(&mut self) -> Result<Vec<u8>> {
        let mut bits = self.random_bits(self.params.fic_bits());
        let offset = self.config.subchannel.bit_offset();
        for _ in 0..self.params.cifs_per_frame {
            let mut cif = self.random_bits(self.params.cif_bits());
            let frame = self.next_logical_frame()?;
            let coded = self.encoder.encode_frame_bits(&frame);
            cif[offset..offset + coded.len()].copy_from_slice(&coded);
            bits.extend_from_slice(&cif);
        }
        Ok(bits)
    }

    /// Soft-bit symbols of the next transmission frame
    pub fn next_frame(&mut self) -> Result<Vec<Vec<f32>>> {
        let bits = self.frame_bits()?;
        let symbol_bits = self.params.symbol_bits();
        if self.config.dqpsk {
            return self.through_dqpsk(&bits);
        }
        let mut symbols = Vec::with_capacity(self.params.symbols_per_frame());
        for chunk in bits.chunks(symbol_bits) {
            let mut symbol = Vec::with_capacity(symbol_bits);
            for &b in chunk {
                let level = if b == 0 { 1.0 } else { -1.0 };
                let noise = self.noise_sample();
                symbol.push(level + noise);
            }
            symbols.push(symbol);
        }
        Ok(symbols)
    }

    fn through_dqpsk(&mut self, bits: &[u8]) -> Result<Vec<Vec<f32>>> {
        let k = self.params.num_carriers;
        let reference = self.random_bits(2 * k);
        let mut out = Vec::with_capacity(self.params.symbols_per_frame());

        let symbols = std::iter::once(reference.as_slice()).chain(bits.chunks(2 * k));
        for (i, chunk) in symbols.enumerate() {
            let trigger = (i == 0) as u8;
            let mapped = qpsk_map(chunk, k)?;
            let mut sent = self.summer.process_symbol(&mapped, trigger)?;
            if self.noise.is_some() {
                for z in sent.iter_mut() {
                    *z += Complex32::new(self.noise_sample(), self.noise_sample());
                }
            }
            if let Some(soft) = self.demod.process(&sent, trigger)? {
                out.push(soft);
            }
        }
        Ok(out)
    }

    /// Write `transmission_frame.dat` and `transmission_frame_trigger.dat`
    /// into `dir`, plus the sent superframes as reference.
    pub fn write_to(&mut self, dir: &Path, progress: Option<&ProgressManager>) -> Result<SynthSummary> {
        std::fs::create_dir_all(dir)?;
        let mut frames = VectorFileSink::create(dir.join(TRANSMISSION_FRAME_FILE))?;
        let mut triggers = ByteFileSink::create(dir.join(TRANSMISSION_TRIGGER_FILE))?;
        let total = self.config.transmission_frames;
        if let Some(pm) = progress {
            let _ = pm.create_bar("synth", total as u64, templates::SYNTH, "");
        }

        let mut symbols = 0;
        for n in 0..total {
            for (i, symbol) in self.next_frame()?.iter().enumerate() {
                frames.write(symbol)?;
                triggers.write(&[(i == 0) as u8])?;
                symbols += 1;
            }
            debug!("Transmission frame {} written", n);
            if let Some(pm) = progress {
                let _ = pm.inc("synth", 1);
                let _ = pm.set_message("synth", &format!("{} superframes", self.sent_superframes.len()));
            }
        }
        frames.finish()?;
        triggers.finish()?;

        let reference = dir.join(format!("sent_{}", CHECKED_FIRECODE_FILE));
        let mut sink = ByteFileSink::create(&reference)?;
        for superframe in &self.sent_superframes {
            sink.write(superframe)?;
        }
        sink.finish()?;
        if let Some(pm) = progress {
            let _ = pm.finish("synth", "done");
        }

        let summary = SynthSummary {
            transmission_frames: total,
            symbols,
            logical_frames: self.logical_frames,
            superframes: self.sent_superframes.len(),
            superframe_file: Some(reference),
        };
        info!(
            "Wrote {} transmission frames ({} symbols, {} logical frames) to {}",
            total,
            symbols,
            summary.logical_frames,
            dir.display()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_correction::crc::verify_firecode;
    use crate::params::Protection;

    fn small_config() -> SynthConfig {
        SynthConfig {
            mode: DabMode::II,
            subchannel: Subchannel::new(0, 12, Protection::EepA(3)).unwrap(),
            transmission_frames: 2,
            ..SynthConfig::default()
        }
    }

    #[test]
    fn test_frame_shape() {
        let mut synth = TransmissionSynth::new(small_config()).unwrap();
        let frame = synth.next_frame().unwrap();
        let params = synth.params().clone();
        assert_eq!(frame.len(), params.symbols_per_frame());
        assert!(frame.iter().all(|s| s.len() == params.symbol_bits()));
        assert!(frame.iter().flatten().all(|&v| v == 1.0 || v == -1.0));
    }

    #[test]
    fn test_superframes_carry_firecode() {
        let mut synth = TransmissionSynth::new(small_config()).unwrap();
        for _ in 0..6 {
            synth.next_frame().unwrap();
        }
        assert_eq!(synth.sent_superframes().len(), 2);
        for superframe in synth.sent_superframes() {
            assert!(verify_firecode(superframe));
        }
    }

    #[test]
    fn test_dqpsk_path_is_transparent() {
        let mut plain = TransmissionSynth::new(small_config()).unwrap();
        let mut dqpsk = TransmissionSynth::new(SynthConfig {
            dqpsk: true,
            ..small_config()
        })
        .unwrap();
        let a = plain.next_frame().unwrap();
        let b = dqpsk.next_frame().unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().flatten().zip(b.iter().flatten()) {
            assert!((x - y).abs() < 1e-3);
        }
    }

    #[test]
    fn test_noise_is_seeded() {
        let config = SynthConfig {
            noise_sigma: 0.3,
            ..small_config()
        };
        let a = TransmissionSynth::new(config.clone()).unwrap().next_frame().unwrap();
        let b = TransmissionSynth::new(config).unwrap().next_frame().unwrap();
        assert_eq!(a, b);
        assert!(a.iter().flatten().any(|&v| v != 1.0 && v != -1.0));
    }

    #[test]
    fn test_bad_noise_sigma_rejected() {
        for sigma in [-0.5, f32::NAN] {
            let config = SynthConfig {
                noise_sigma: sigma,
                ..small_config()
            };
            assert!(matches!(
                TransmissionSynth::new(config),
                Err(DabError::Config { .. })
            ));
        }
    }

    #[test]
    fn test_noise_spread_follows_sigma() {
        let clean = TransmissionSynth::new(small_config())
            .unwrap()
            .next_frame()
            .unwrap();
        let noisy = TransmissionSynth::new(SynthConfig {
            noise_sigma: 0.5,
            ..small_config()
        })
        .unwrap()
        .next_frame()
        .unwrap();
        let deviations: Vec<f32> = noisy
            .iter()
            .flatten()
            .zip(clean.iter().flatten())
            .map(|(n, c)| n - c)
            .collect();
        let n = deviations.len() as f32;
        let mean = deviations.iter().sum::<f32>() / n;
        let var = deviations.iter().map(|d| (d - mean).powi(2)).sum::<f32>() / n;
        assert!((var.sqrt() - 0.5).abs() < 0.05, "std {}", var.sqrt());
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut synth = TransmissionSynth::new(small_config()).unwrap();
        let summary = synth.write_to(dir.path(), None).unwrap();
        let params = synth.params().clone();
        assert_eq!(summary.symbols, 2 * params.symbols_per_frame());
        let triggers = std::fs::read(dir.path().join(TRANSMISSION_TRIGGER_FILE)).unwrap();
        assert_eq!(triggers.len(), summary.symbols);
        assert_eq!(triggers.iter().filter(|&&t| t == 1).count(), 2);
        let frames = std::fs::metadata(dir.path().join(TRANSMISSION_FRAME_FILE)).unwrap();
        assert_eq!(frames.len() as usize, summary.symbols * params.symbol_bits() * 4);
    }
}
