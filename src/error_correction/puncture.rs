//! Puncturing of the mother code for equal error protection.
//!
//! PI_i keeps 8 + i of every 32 mother code bits. The vectors are built from
//! eight groups of four bits; starting from `1000` in every group, each step
//! from PI_i to PI_{i+1} adds one more kept bit to the groups in the order
//! 0, 4, 2, 6, 1, 5, 3, 7 (ETSI EN 300 401, table 29).

use tracing::trace;

use crate::params::PuncturingProfile;
use crate::utils::consts::{CONV_MEMORY, CONV_RATE_INV, PUNCTURE_BLOCK_INPUT_BITS};

pub const PI_LEN: usize = 32;

/// Kept tail bits: 1100 repeated over the 24 tail bits
pub const TAIL_VECTOR: [bool; 24] = [
    true, true, false, false, true, true, false, false, true, true, false, false, true, true,
    false, false, true, true, false, false, true, true, false, false,
];

const GROUP_FILL_ORDER: [usize; 8] = [0, 4, 2, 6, 1, 5, 3, 7];

/// Puncturing vector PI_`index` (1..=24)
pub fn puncturing_vector(index: usize) -> [bool; PI_LEN] {
    assert!((1..=24).contains(&index), "PI index {} out of 1..24", index);
    let mut vector = [false; PI_LEN];
    for (rank, &group) in GROUP_FILL_ORDER.iter().enumerate() {
        let ones = 1 + (index + 7 - rank) / 8;
        for bit in 0..ones.min(4) {
            vector[group * 4 + bit] = true;
        }
    }
    vector
}

/// Expanded keep-mask over the whole terminated mother codeword.
pub fn puncturing_mask(profile: &PuncturingProfile) -> Vec<bool> {
    let block_len = PUNCTURE_BLOCK_INPUT_BITS * CONV_RATE_INV;
    let mut mask = Vec::with_capacity(profile.blocks() * block_len + TAIL_VECTOR.len());
    for (blocks, pi) in [(profile.l1, profile.pi1), (profile.l2, profile.pi2)] {
        let vector = puncturing_vector(pi);
        for _ in 0..blocks * (block_len / PI_LEN) {
            mask.extend_from_slice(&vector);
        }
    }
    debug_assert_eq!(TAIL_VECTOR.len(), CONV_MEMORY * CONV_RATE_INV);
    mask.extend_from_slice(&TAIL_VECTOR);
    mask
}

/// Drop the bits the profile does not transmit.
pub fn puncture(mask: &[bool], mother_bits: &[u8]) -> Vec<u8> {
    mother_bits
        .iter()
        .zip(mask.iter())
        .filter(|(_, keep)| **keep)
        .map(|(bit, _)| *bit)
        .collect()
}

/// Re-insert erasures (0.0) at punctured positions.
///
/// Missing received values are treated as erasures too, so a short input
/// still yields a full-length codeword.
pub fn depuncture(mask: &[bool], soft: &[f32]) -> Vec<f32> {
    let mut received = soft.iter();
    let restored: Vec<f32> = mask
        .iter()
        .map(|&keep| {
            if keep {
                received.next().copied().unwrap_or(0.0)
            } else {
                0.0
            }
        })
        .collect();
    let leftover = received.count();
    if leftover > 0 {
        trace!("Depuncturing ignored {} surplus soft values", leftover);
    }
    restored
}
