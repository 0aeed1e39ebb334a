//! Time interleaving over 16 CIFs.
//!
//! Bit `i` of a subchannel is delayed by `d(i mod 16)` CIFs at the
//! transmitter and by `15 - d(i mod 16)` CIFs at the receiver, so every bit
//! leaves the deinterleaver exactly 15 CIFs after it entered the interleaver.

use std::collections::VecDeque;

use crate::utils::consts::TIME_INTERLEAVING_DEPTH;

/// Transmitter-side delay in CIFs, indexed by `i mod 16` (bit reversal of i)
pub const INTERLEAVING_DELAY: [usize; TIME_INTERLEAVING_DEPTH] =
    [0, 8, 4, 12, 2, 10, 6, 14, 1, 9, 5, 13, 3, 11, 7, 15];

/// Convolutional delay line shared by interleaver and deinterleaver.
struct DelayLine<T> {
    history: VecDeque<Vec<T>>,
    delays: [usize; TIME_INTERLEAVING_DEPTH],
    len: usize,
    fill: T,
    pushed: usize,
}

impl<T: Copy> DelayLine<T> {
    fn new(len: usize, delays: [usize; TIME_INTERLEAVING_DEPTH], fill: T) -> Self {
        Self {
            history: VecDeque::with_capacity(TIME_INTERLEAVING_DEPTH),
            delays,
            len,
            fill,
            pushed: 0,
        }
    }

    fn push(&mut self, input: &[T]) -> Vec<T> {
        assert_eq!(input.len(), self.len, "subchannel length changed");
        if self.history.len() == TIME_INTERLEAVING_DEPTH {
            self.history.pop_back();
        }
        self.history.push_front(input.to_vec());
        self.pushed += 1;

        (0..self.len)
            .map(|i| {
                let delay = self.delays[i % TIME_INTERLEAVING_DEPTH];
                self.history
                    .get(delay)
                    .map(|cif| cif[i])
                    .unwrap_or(self.fill)
            })
            .collect()
    }

    fn reset(&mut self) {
        self.history.clear();
        self.pushed = 0;
    }
}

/// Transmitter side, operating on hard bits.
pub struct TimeInterleaver {
    line: DelayLine<u8>,
}

impl TimeInterleaver {
    pub fn new(len: usize) -> Self {
        Self {
            line: DelayLine::new(len, INTERLEAVING_DELAY, 0),
        }
    }

    pub fn interleave(&mut self, bits: &[u8]) -> Vec<u8> {
        self.line.push(bits)
    }
}

/// Receiver side, operating on soft bits. Positions not yet filled read as
/// erasures (0.0).
pub struct TimeDeinterleaver {
    line: DelayLine<f32>,
}

impl TimeDeinterleaver {
    pub fn new(len: usize) -> Self {
        let mut delays = [0usize; TIME_INTERLEAVING_DEPTH];
        for (d, &tx) in delays.iter_mut().zip(INTERLEAVING_DELAY.iter()) {
            *d = TIME_INTERLEAVING_DEPTH - 1 - tx;
        }
        Self {
            line: DelayLine::new(len, delays, 0.0),
        }
    }

    pub fn deinterleave(&mut self, soft: &[f32]) -> Vec<f32> {
        self.line.push(soft)
    }

    /// True once every output position is backed by received data.
    pub fn is_primed(&self) -> bool {
        self.line.pushed >= TIME_INTERLEAVING_DEPTH
    }

    /// CIFs still needed before the output is valid.
    pub fn cifs_until_primed(&self) -> usize {
        TIME_INTERLEAVING_DEPTH.saturating_sub(self.line.pushed)
    }

    pub fn reset(&mut self) {
        self.line.reset();
    }
}
