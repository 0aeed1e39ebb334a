//! Subchannel placement inside the CIF and its equal error protection profile.

use serde::{Deserialize, Serialize};

use crate::utils::consts::{
    CIF_CAPACITY_UNITS, CONV_RATE_INV, CU_BITS, LOGICAL_FRAME_MS, PUNCTURE_BLOCK_INPUT_BITS,
    TAIL_PUNCTURED_BITS,
};
use crate::utils::error::{DabError, Result};

/// Equal error protection class and level (1 = strongest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protection {
    EepA(u8),
    EepB(u8),
}

impl Protection {
    /// Map the `(protection, option)` pair of the FIG 0/1 long form:
    /// `protection` 0..3 selects level 1..4, `option` 0 = A tables, 1 = B tables.
    pub fn from_index(protection: u8, option: u8) -> Result<Self> {
        if protection > 3 {
            return Err(DabError::config(format!(
                "protection index {} out of range 0..3",
                protection
            )));
        }
        match option {
            0 => Ok(Protection::EepA(protection + 1)),
            1 => Ok(Protection::EepB(protection + 1)),
            other => Err(DabError::config(format!(
                "protection option {} is not an EEP option",
                other
            ))),
        }
    }

    /// Capacity units needed per unit of the bit rate factor `n`.
    fn cu_per_n(self) -> usize {
        match self {
            Protection::EepA(1) => 12,
            Protection::EepA(2) => 8,
            Protection::EepA(3) => 6,
            Protection::EepA(_) => 4,
            Protection::EepB(1) => 27,
            Protection::EepB(2) => 21,
            Protection::EepB(3) => 18,
            Protection::EepB(_) => 15,
        }
    }

    /// Bit rate contributed by one unit of `n` (kbit/s).
    fn kbps_per_n(self) -> usize {
        match self {
            Protection::EepA(_) => 8,
            Protection::EepB(_) => 32,
        }
    }

    fn level(self) -> u8 {
        match self {
            Protection::EepA(l) | Protection::EepB(l) => l,
        }
    }

    pub fn label(self) -> String {
        match self {
            Protection::EepA(l) => format!("EEP {}-A", l),
            Protection::EepB(l) => format!("EEP {}-B", l),
        }
    }
}

/// Two-range puncturing: `l1` blocks with PI_`pi1`, then `l2` blocks with
/// PI_`pi2`, then the tail. One block covers 32 input bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PuncturingProfile {
    pub l1: usize,
    pub pi1: usize,
    pub l2: usize,
    pub pi2: usize,
}

impl PuncturingProfile {
    pub fn blocks(&self) -> usize {
        self.l1 + self.l2
    }

    /// Information bits protected by this profile (tail excluded).
    pub fn input_bits(&self) -> usize {
        self.blocks() * PUNCTURE_BLOCK_INPUT_BITS
    }

    /// Transmitted bits after puncturing, tail included.
    pub fn punctured_bits(&self) -> usize {
        // PI_i keeps 8 + i of every 32 mother code bits, four times per block
        CONV_RATE_INV * (self.l1 * (8 + self.pi1) + self.l2 * (8 + self.pi2))
            + TAIL_PUNCTURED_BITS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subchannel {
    /// First capacity unit of the subchannel.
    pub start_address: usize,
    /// Subchannel size in capacity units.
    pub size: usize,
    pub protection: Protection,
}

impl Subchannel {
    pub fn new(start_address: usize, size: usize, protection: Protection) -> Result<Self> {
        let level = protection.level();
        if !(1..=4).contains(&level) {
            return Err(DabError::config(format!(
                "protection level {} out of range 1..4",
                level
            )));
        }
        if size == 0 || start_address + size > CIF_CAPACITY_UNITS {
            return Err(DabError::config(format!(
                "subchannel [{}, {}) does not fit into {} capacity units",
                start_address,
                start_address + size,
                CIF_CAPACITY_UNITS
            )));
        }
        if size % protection.cu_per_n() != 0 {
            return Err(DabError::config(format!(
                "size {} CU is not a multiple of {} required by {}",
                size,
                protection.cu_per_n(),
                protection.label()
            )));
        }
        Ok(Self {
            start_address,
            size,
            protection,
        })
    }

    /// Bit rate factor `n` of the protection table.
    pub fn n(&self) -> usize {
        self.size / self.protection.cu_per_n()
    }

    pub fn bitrate_kbps(&self) -> usize {
        self.n() * self.protection.kbps_per_n()
    }

    /// Bit rate as a multiple of 8 kbit/s, the unit the DAB+ superframe uses.
    pub fn bit_rate_n(&self) -> usize {
        self.bitrate_kbps() / 8
    }

    pub fn logical_frame_bits(&self) -> usize {
        self.bitrate_kbps() * LOGICAL_FRAME_MS
    }

    pub fn logical_frame_bytes(&self) -> usize {
        self.logical_frame_bits() / 8
    }

    /// Soft bits the subchannel occupies in every CIF.
    pub fn bits(&self) -> usize {
        self.size * CU_BITS
    }

    /// First soft bit of the subchannel inside a CIF.
    pub fn bit_offset(&self) -> usize {
        self.start_address * CU_BITS
    }

    pub fn puncturing(&self) -> PuncturingProfile {
        let n = self.n();
        match self.protection {
            Protection::EepA(1) => PuncturingProfile {
                l1: 6 * n - 3,
                pi1: 24,
                l2: 3,
                pi2: 23,
            },
            Protection::EepA(2) if n == 1 => PuncturingProfile {
                l1: 5,
                pi1: 13,
                l2: 1,
                pi2: 12,
            },
            Protection::EepA(2) => PuncturingProfile {
                l1: 2 * n - 3,
                pi1: 14,
                l2: 4 * n + 3,
                pi2: 13,
            },
            Protection::EepA(3) => PuncturingProfile {
                l1: 6 * n - 3,
                pi1: 8,
                l2: 3,
                pi2: 7,
            },
            Protection::EepA(_) => PuncturingProfile {
                l1: 4 * n - 3,
                pi1: 3,
                l2: 2 * n + 3,
                pi2: 2,
            },
            Protection::EepB(level) => {
                let pi1 = match level {
                    1 => 10,
                    2 => 6,
                    3 => 4,
                    _ => 2,
                };
                PuncturingProfile {
                    l1: 24 * n - 3,
                    pi1,
                    l2: 3,
                    pi2: pi1 - 1,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_subchannel() {
        let sc = Subchannel::new(54, 90, Protection::from_index(2, 0).unwrap()).unwrap();
        assert_eq!(sc.protection, Protection::EepA(3));
        assert_eq!(sc.n(), 15);
        assert_eq!(sc.bitrate_kbps(), 120);
        assert_eq!(sc.bit_rate_n(), 15);
        assert_eq!(sc.logical_frame_bytes(), 360);
        assert_eq!(sc.bit_offset(), 54 * 64);
    }

    #[test]
    fn test_profiles_fill_subchannel() {
        for level in 0..4u8 {
            for option in 0..2u8 {
                let protection = Protection::from_index(level, option).unwrap();
                for n in 1..=8 {
                    let size = n * protection.cu_per_n();
                    if size > CIF_CAPACITY_UNITS {
                        continue;
                    }
                    let sc = Subchannel::new(0, size, protection).unwrap();
                    let profile = sc.puncturing();
                    assert_eq!(profile.punctured_bits(), sc.bits(), "{:?} n={}", protection, n);
                    assert_eq!(profile.input_bits(), sc.logical_frame_bits());
                }
            }
        }
    }

    #[test]
    fn test_invalid_subchannels() {
        assert!(Subchannel::new(800, 90, Protection::EepA(3)).is_err());
        assert!(Subchannel::new(0, 91, Protection::EepA(3)).is_err());
        assert!(Protection::from_index(4, 0).is_err());
        assert!(Protection::from_index(0, 2).is_err());
    }
}
