use tracing::{debug, trace, warn};

use crate::params::{DabParameters, Subchannel};
use crate::utils::error::{DabError, Result};

/// Collects demodulated symbols into transmission frames and cuts the MSC
/// part into Common Interleaved Frames.
///
/// A trigger value of 1 marks the first symbol of a transmission frame.
pub struct FrameAssembler {
    params: DabParameters,
    frame: Vec<f32>,
    symbols_in_frame: usize,
    in_frame: bool,
    frames_completed: usize,
    frames_dropped: usize,
    symbols_discarded: usize,
}

impl FrameAssembler {
    pub fn new(params: DabParameters) -> Self {
        let capacity = params.symbols_per_frame() * params.symbol_bits();
        Self {
            params,
            frame: Vec::with_capacity(capacity),
            symbols_in_frame: 0,
            in_frame: false,
            frames_completed: 0,
            frames_dropped: 0,
            symbols_discarded: 0,
        }
    }

    pub fn params(&self) -> &DabParameters {
        &self.params
    }

    /// Feed one symbol. Returns the CIFs of a frame once its last symbol
    /// arrived, otherwise an empty vector.
    pub fn push_symbol(&mut self, symbol: &[f32], trigger: u8) -> Result<Vec<Vec<f32>>> {
        if symbol.len() != self.params.symbol_bits() {
            return Err(DabError::stream(format!(
                "symbol has {} soft bits, mode {:?} expects {}",
                symbol.len(),
                self.params.mode,
                self.params.symbol_bits()
            )));
        }

        if trigger == 1 {
            if self.in_frame && self.symbols_in_frame > 0 {
                warn!(
                    "Dropping incomplete frame ({} of {} symbols)",
                    self.symbols_in_frame,
                    self.params.symbols_per_frame()
                );
                self.frames_dropped += 1;
            }
            self.frame.clear();
            self.symbols_in_frame = 0;
            self.in_frame = true;
        } else if !self.in_frame {
            self.symbols_discarded += 1;
            trace!("Discarding symbol before first frame start");
            return Ok(Vec::new());
        }

        self.frame.extend_from_slice(symbol);
        self.symbols_in_frame += 1;

        if self.symbols_in_frame < self.params.symbols_per_frame() {
            return Ok(Vec::new());
        }

        self.in_frame = false;
        self.frames_completed += 1;
        let cifs = self.split_cifs();
        self.frame.clear();
        self.symbols_in_frame = 0;
        debug!(
            "Transmission frame {} complete, {} CIFs",
            self.frames_completed,
            cifs.len()
        );
        Ok(cifs)
    }

    fn split_cifs(&self) -> Vec<Vec<f32>> {
        let msc = &self.frame[self.params.fic_bits()..];
        msc.chunks_exact(self.params.cif_bits())
            .map(|cif| cif.to_vec())
            .collect()
    }

    pub fn frames_completed(&self) -> usize {
        self.frames_completed
    }

    pub fn frames_dropped(&self) -> usize {
        self.frames_dropped
    }

    pub fn symbols_discarded(&self) -> usize {
        self.symbols_discarded
    }
}

/// Soft bits of one subchannel inside a CIF
pub fn select_subchannel<'a>(cif: &'a [f32], subchannel: &Subchannel) -> &'a [f32] {
    let start = subchannel.bit_offset();
    &cif[start..start + subchannel.bits()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{DabMode, Protection};

    fn params() -> DabParameters {
        DabParameters::new(DabMode::II, 1.452e9)
    }

    #[test]
    fn test_frame_assembly() {
        let p = params();
        let mut asm = FrameAssembler::new(p.clone());
        let symbol = vec![0.5f32; p.symbol_bits()];

        // symbols before the first trigger are ignored
        assert!(asm.push_symbol(&symbol, 0).unwrap().is_empty());
        assert_eq!(asm.symbols_discarded(), 1);

        let mut cifs = Vec::new();
        for i in 0..p.symbols_per_frame() {
            let trigger = (i == 0) as u8;
            cifs = asm.push_symbol(&symbol, trigger).unwrap();
        }
        assert_eq!(cifs.len(), p.cifs_per_frame);
        assert_eq!(cifs[0].len(), p.cif_bits());
        assert_eq!(asm.frames_completed(), 1);
    }

    #[test]
    fn test_fic_is_skipped() {
        let p = params();
        let mut asm = FrameAssembler::new(p.clone());
        let mut cifs = Vec::new();
        for i in 0..p.symbols_per_frame() {
            let value = if i < p.num_fic_symbols { 9.0 } else { i as f32 };
            let symbol = vec![value; p.symbol_bits()];
            cifs = asm.push_symbol(&symbol, (i == 0) as u8).unwrap();
        }
        assert_eq!(cifs[0][0], p.num_fic_symbols as f32);
        assert!(cifs[0].iter().all(|&v| v != 9.0));
    }

    #[test]
    fn test_incomplete_frame_dropped() {
        let p = params();
        let mut asm = FrameAssembler::new(p.clone());
        let symbol = vec![0.0f32; p.symbol_bits()];
        asm.push_symbol(&symbol, 1).unwrap();
        asm.push_symbol(&symbol, 0).unwrap();
        asm.push_symbol(&symbol, 1).unwrap();
        assert_eq!(asm.frames_dropped(), 1);
    }

    #[test]
    fn test_wrong_symbol_width() {
        let mut asm = FrameAssembler::new(params());
        assert!(asm.push_symbol(&[0.0; 10], 1).is_err());
    }

    #[test]
    fn test_select_subchannel() {
        let cif: Vec<f32> = (0..55296).map(|i| i as f32).collect();
        let sc = Subchannel::new(54, 90, Protection::EepA(3)).unwrap();
        let slice = select_subchannel(&cif, &sc);
        assert_eq!(slice.len(), 90 * 64);
        assert_eq!(slice[0], (54 * 64) as f32);
    }
}
