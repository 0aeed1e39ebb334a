// Energy dispersal scrambler, PRBS x^9 + x^5 + 1 with all-ones preset
// Restarted at the beginning of every logical frame

/// Pseudo-random bit sequence generator
pub struct Prbs {
    reg: u16,
}

impl Prbs {
    pub fn new() -> Self {
        Self { reg: 0x1FF }
    }
}

impl Default for Prbs {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Prbs {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        let bit = ((self.reg >> 8) ^ (self.reg >> 4)) & 1;
        self.reg = ((self.reg << 1) | bit) & 0x1FF;
        Some(bit as u8)
    }
}

/// XOR bits (0/1 values) with a freshly started PRBS, in place
pub fn disperse_bits(bits: &mut [u8]) {
    for (bit, prbs) in bits.iter_mut().zip(Prbs::new()) {
        *bit ^= prbs;
    }
}

/// Byte-wise variant for logical frames already packed MSB first
pub fn disperse_bytes(bytes: &mut [u8]) {
    let mut prbs = Prbs::new();
    for byte in bytes.iter_mut() {
        let mut mask = 0u8;
        for _ in 0..8 {
            mask = (mask << 1) | prbs.next().unwrap_or(0);
        }
        *byte ^= mask;
    }
}
