//! Differential QPSK on the OFDM carriers.
//!
//! Symbols are vectors of one complex value per carrier. A trigger of 1
//! marks the phase reference symbol that starts a transmission frame.

use num_complex::Complex32;
use std::f32::consts::FRAC_1_SQRT_2;

use crate::utils::error::{DabError, Result};

/// Running carrier-wise product of symbols, restarted on every trigger.
///
/// A triggered symbol passes unchanged, every other symbol is multiplied by
/// the previous output. The last output survives between calls.
pub struct PhasorSummer {
    length: usize,
    last: Vec<Complex32>,
}

impl PhasorSummer {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            last: vec![Complex32::new(0.0, 0.0); length],
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn process_symbol(&mut self, symbol: &[Complex32], trigger: u8) -> Result<Vec<Complex32>> {
        if symbol.len() != self.length {
            return Err(DabError::stream(format!(
                "phasor symbol of {} carriers, expected {}",
                symbol.len(),
                self.length
            )));
        }
        let out: Vec<Complex32> = if trigger == 1 {
            symbol.to_vec()
        } else {
            symbol
                .iter()
                .zip(self.last.iter())
                .map(|(x, prev)| x * prev)
                .collect()
        };
        self.last.copy_from_slice(&out);
        Ok(out)
    }

    /// Batch form: one trigger byte per symbol, triggers pass through
    pub fn process(
        &mut self,
        symbols: &[Vec<Complex32>],
        triggers: &[u8],
    ) -> Result<(Vec<Vec<Complex32>>, Vec<u8>)> {
        if symbols.len() != triggers.len() {
            return Err(DabError::stream(format!(
                "{} symbols but {} trigger bytes",
                symbols.len(),
                triggers.len()
            )));
        }
        let out = symbols
            .iter()
            .zip(triggers)
            .map(|(s, &t)| self.process_symbol(s, t))
            .collect::<Result<Vec<_>>>()?;
        Ok((out, triggers.to_vec()))
    }
}

/// QPSK symbol mapping: bit `n` on the real part and bit `n + K` on the
/// imaginary part, `(1 - 2p_n) + j(1 - 2p_{n+K})` scaled to unit power.
pub fn qpsk_map(bits: &[u8], num_carriers: usize) -> Result<Vec<Complex32>> {
    if bits.len() != 2 * num_carriers {
        return Err(DabError::stream(format!(
            "{} bits cannot be mapped onto {} carriers",
            bits.len(),
            num_carriers
        )));
    }
    let level = |b: u8| if b & 1 == 0 { FRAC_1_SQRT_2 } else { -FRAC_1_SQRT_2 };
    Ok((0..num_carriers)
        .map(|k| Complex32::new(level(bits[k]), level(bits[k + num_carriers])))
        .collect())
}

/// Differential demodulation into soft bits.
///
/// The triggered symbol only serves as reference. For the following symbols
/// carrier `k` yields `Re(z conj(prev))` as soft bit `k` and the imaginary
/// part as soft bit `k + K`, scaled so a clean unit symbol gives +-1.
pub struct DifferentialDemodulator {
    num_carriers: usize,
    reference: Option<Vec<Complex32>>,
}

impl DifferentialDemodulator {
    pub fn new(num_carriers: usize) -> Self {
        Self {
            num_carriers,
            reference: None,
        }
    }

    pub fn process(&mut self, symbol: &[Complex32], trigger: u8) -> Result<Option<Vec<f32>>> {
        if symbol.len() != self.num_carriers {
            return Err(DabError::stream(format!(
                "symbol of {} carriers, expected {}",
                symbol.len(),
                self.num_carriers
            )));
        }
        if trigger == 1 {
            self.reference = Some(symbol.to_vec());
            return Ok(None);
        }
        let Some(prev) = self.reference.as_mut() else {
            return Ok(None);
        };

        let k = self.num_carriers;
        let mut soft = vec![0.0f32; 2 * k];
        for (i, (z, p)) in symbol.iter().zip(prev.iter()).enumerate() {
            let d = z * p.conj() * std::f32::consts::SQRT_2;
            soft[i] = d.re;
            soft[i + k] = d.im;
        }
        prev.copy_from_slice(symbol);
        Ok(Some(soft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(seed: usize, k: usize) -> Vec<u8> {
        (0..2 * k).map(|i| ((i * 7 + seed * 13) % 5 < 2) as u8).collect()
    }

    #[test]
    fn test_trigger_passes_through() {
        let mut summer = PhasorSummer::new(2);
        let a = vec![Complex32::new(0.0, 1.0), Complex32::new(1.0, 0.0)];
        let out = summer.process_symbol(&a, 1).unwrap();
        assert_eq!(out, a);
        let out = summer.process_symbol(&a, 0).unwrap();
        assert_eq!(out[0], Complex32::new(-1.0, 0.0));
        assert_eq!(out[1], Complex32::new(1.0, 0.0));
    }

    #[test]
    fn test_state_kept_between_batches() {
        let mut summer = PhasorSummer::new(1);
        let j = vec![Complex32::new(0.0, 1.0)];
        summer.process(&[j.clone(), j.clone()], &[1, 0]).unwrap();
        let (out, triggers) = summer.process(&[j.clone()], &[0]).unwrap();
        // j * j * j = -j
        assert_eq!(out[0][0], Complex32::new(0.0, -1.0));
        assert_eq!(triggers, vec![0]);
    }

    #[test]
    fn test_untriggered_start_is_zero() {
        let mut summer = PhasorSummer::new(1);
        let out = summer.process_symbol(&[Complex32::new(1.0, 1.0)], 0).unwrap();
        assert_eq!(out[0], Complex32::new(0.0, 0.0));
    }

    #[test]
    fn test_differential_round_trip() {
        let k = 8;
        let mut summer = PhasorSummer::new(k);
        let mut demod = DifferentialDemodulator::new(k);

        let reference = qpsk_map(&bits(99, k), k).unwrap();
        let tx = summer.process_symbol(&reference, 1).unwrap();
        assert!(demod.process(&tx, 1).unwrap().is_none());

        for s in 0..4 {
            let b = bits(s, k);
            let tx = summer.process_symbol(&qpsk_map(&b, k).unwrap(), 0).unwrap();
            let soft = demod.process(&tx, 0).unwrap().unwrap();
            let hard: Vec<u8> = soft.iter().map(|&v| (v < 0.0) as u8).collect();
            assert_eq!(hard, b);
            assert!(soft.iter().all(|v| (v.abs() - 1.0).abs() < 1e-4));
        }
    }

    #[test]
    fn test_length_checks() {
        assert!(qpsk_map(&[0, 1, 0], 2).is_err());
        assert!(PhasorSummer::new(3).process_symbol(&[], 0).is_err());
        assert!(PhasorSummer::new(1).process(&[], &[1]).is_err());
    }
}
