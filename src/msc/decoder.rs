use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

use super::assembler::{FrameAssembler, select_subchannel};
use crate::error_correction::crc::bits_to_bytes;
use crate::error_correction::energy_dispersal::disperse_bits;
use crate::error_correction::puncture::{depuncture, puncturing_mask};
use crate::error_correction::{TimeDeinterleaver, ViterbiDecoder};
use crate::params::{DabParameters, Subchannel};
use crate::utils::consts::{MSC_DECODED_DEBUG_FILE, MSC_SUBCHANNEL_DEBUG_FILE};
use crate::utils::error::Result;

/// One decoded logical frame of a subchannel (24 ms of data)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalFrame {
    /// Position in the decoded stream, starting at 0
    pub index: usize,
    pub data: Vec<u8>,
}

/// Channel decoder for a single EEP subchannel.
pub struct MscDecoder {
    subchannel: Subchannel,
    deinterleaver: TimeDeinterleaver,
    mask: Vec<bool>,
    viterbi: ViterbiDecoder,
    cifs_seen: usize,
    frames_decoded: usize,
}

impl MscDecoder {
    pub fn new(subchannel: Subchannel) -> Self {
        let mask = puncturing_mask(&subchannel.puncturing());
        debug!(
            "MSC decoder: subchannel @{} size {} CU, {}, {} kbit/s, {} bytes/frame",
            subchannel.start_address,
            subchannel.size,
            subchannel.protection.label(),
            subchannel.bitrate_kbps(),
            subchannel.logical_frame_bytes()
        );
        Self {
            deinterleaver: TimeDeinterleaver::new(subchannel.bits()),
            subchannel,
            mask,
            viterbi: ViterbiDecoder::dab(),
            cifs_seen: 0,
            frames_decoded: 0,
        }
    }

    pub fn subchannel(&self) -> &Subchannel {
        &self.subchannel
    }

    /// Decode the subchannel part of one CIF.
    ///
    /// Returns `None` while the time deinterleaver is still filling up.
    pub fn decode_cif(&mut self, soft: &[f32]) -> Option<LogicalFrame> {
        self.cifs_seen += 1;
        let deinterleaved = self.deinterleaver.deinterleave(soft);
        if !self.deinterleaver.is_primed() {
            trace!(
                "Deinterleaver priming, {} CIFs to go",
                self.deinterleaver.cifs_until_primed()
            );
            return None;
        }

        let mother = depuncture(&self.mask, &deinterleaved);
        let mut bits = self.viterbi.decode_terminated(&mother);
        bits.truncate(self.subchannel.logical_frame_bits());
        disperse_bits(&mut bits);

        let frame = LogicalFrame {
            index: self.frames_decoded,
            data: bits_to_bytes(&bits),
        };
        self.frames_decoded += 1;
        Some(frame)
    }

    pub fn cifs_seen(&self) -> usize {
        self.cifs_seen
    }

    pub fn frames_decoded(&self) -> usize {
        self.frames_decoded
    }

    pub fn reset(&mut self) {
        self.deinterleaver.reset();
        self.cifs_seen = 0;
        self.frames_decoded = 0;
    }
}

/// Raw dumps of the intermediate decoder signals
struct DebugTaps {
    dir: PathBuf,
    subchannel: BufWriter<File>,
    decoded: BufWriter<File>,
}

impl DebugTaps {
    fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            subchannel: BufWriter::new(File::create(dir.join(MSC_SUBCHANNEL_DEBUG_FILE))?),
            decoded: BufWriter::new(File::create(dir.join(MSC_DECODED_DEBUG_FILE))?),
        })
    }
}

/// Statistics of an `MscDecode` run
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MscStats {
    pub symbols: usize,
    pub transmission_frames: usize,
    pub frames_dropped: usize,
    pub cifs: usize,
    pub logical_frames: usize,
}

/// Complete MSC path: symbol stream in, logical frames out.
pub struct MscDecode {
    assembler: FrameAssembler,
    decoder: MscDecoder,
    verbose: bool,
    taps: Option<DebugTaps>,
    symbols: usize,
}

impl MscDecode {
    pub fn new(params: DabParameters, subchannel: Subchannel, verbose: bool) -> Self {
        Self {
            assembler: FrameAssembler::new(params),
            decoder: MscDecoder::new(subchannel),
            verbose,
            taps: None,
            symbols: 0,
        }
    }

    /// Write `msc_subchannel.dat` and `msc_decoded.dat` into `dir`
    pub fn with_debug_dir(mut self, dir: &Path) -> Result<Self> {
        let taps = DebugTaps::open(dir)?;
        info!("MSC debug output in {}", taps.dir.display());
        self.taps = Some(taps);
        Ok(self)
    }

    pub fn process(&mut self, symbol: &[f32], trigger: u8) -> Result<Vec<LogicalFrame>> {
        self.symbols += 1;
        let cifs = self.assembler.push_symbol(symbol, trigger)?;
        let mut frames = Vec::new();
        for cif in cifs {
            let soft = select_subchannel(&cif, self.decoder.subchannel());
            if let Some(taps) = self.taps.as_mut() {
                for &value in soft {
                    taps.subchannel.write_f32::<LittleEndian>(value)?;
                }
            }
            if let Some(frame) = self.decoder.decode_cif(soft) {
                if self.verbose {
                    info!(
                        "Logical frame {}: {} bytes, head {:02x?}",
                        frame.index,
                        frame.data.len(),
                        &frame.data[..frame.data.len().min(4)]
                    );
                }
                if let Some(taps) = self.taps.as_mut() {
                    taps.decoded.write_all(&frame.data)?;
                }
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(taps) = self.taps.as_mut() {
            taps.subchannel.flush()?;
            taps.decoded.flush()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> MscStats {
        MscStats {
            symbols: self.symbols,
            transmission_frames: self.assembler.frames_completed(),
            frames_dropped: self.assembler.frames_dropped(),
            cifs: self.decoder.cifs_seen(),
            logical_frames: self.decoder.frames_decoded(),
        }
    }
}
