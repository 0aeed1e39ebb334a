//! Rate 1/4, K = 7 mother code of the DAB channel coding and its
//! soft-decision Viterbi decoder.
//!
//! Generator taps are written in octal with the current input bit as the
//! most significant tap, so 0o133 = 1011011 is `a_i + a_{i-2} + a_{i-3} +
//! a_{i-5} + a_{i-6}`.

use tracing::trace;

/// DAB mother code generators (ETSI EN 300 401, 11.1.1)
pub const DAB_GENERATORS: [u32; 4] = [0o133, 0o171, 0o145, 0o133];
pub const DAB_CONSTRAINT_LENGTH: usize = 7;

/// Shift register convolutional encoder.
#[derive(Debug, Clone)]
pub struct ConvolutionalEncoder {
    constraint_length: usize,
    generators: Vec<u32>,
    state: u32,
    state_mask: u32,
}

impl ConvolutionalEncoder {
    pub fn new(constraint_length: usize, generators: Vec<u32>) -> Self {
        assert!(constraint_length >= 2, "Constraint length must be >= 2");
        assert!(!generators.is_empty(), "Must have at least one generator");
        let state_mask = (1u32 << (constraint_length - 1)) - 1;
        Self {
            constraint_length,
            generators,
            state: 0,
            state_mask,
        }
    }

    pub fn dab() -> Self {
        Self::new(DAB_CONSTRAINT_LENGTH, DAB_GENERATORS.to_vec())
    }

    /// Encode bits (0/1 values), `n` output bits per input bit.
    pub fn encode(&mut self, input: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(input.len() * self.generators.len());
        for &bit in input {
            let reg = (((bit & 1) as u32) << (self.constraint_length - 1)) | self.state;
            for &generator in &self.generators {
                output.push(((reg & generator).count_ones() & 1) as u8);
            }
            self.state = (reg >> 1) & self.state_mask;
        }
        output
    }

    /// Encode `input` followed by K-1 zero tail bits and reset the register.
    pub fn encode_terminated(&mut self, input: &[u8]) -> Vec<u8> {
        let mut output = self.encode(input);
        let tail = vec![0u8; self.constraint_length - 1];
        output.extend(self.encode(&tail));
        debug_assert_eq!(self.state, 0);
        output
    }

    pub fn reset(&mut self) {
        self.state = 0;
    }
}

/// Maximum-likelihood decoder over the code trellis.
///
/// Soft values follow the LLR sign convention: positive means bit 0, negative
/// means bit 1 and `0.0` is an erasure that favours neither branch.
#[derive(Debug, Clone)]
pub struct ViterbiDecoder {
    constraint_length: usize,
    rate_inv: usize,
    num_states: usize,
    /// Expected antipodal outputs (+1.0 for 0, -1.0 for 1): [state][input]
    branch_outputs: Vec<[Vec<f32>; 2]>,
    next_states: Vec<[usize; 2]>,
}

impl ViterbiDecoder {
    pub fn new(constraint_length: usize, generators: Vec<u32>) -> Self {
        assert!(constraint_length >= 2, "Constraint length must be >= 2");
        assert!(!generators.is_empty(), "Must have at least one generator");

        let num_states = 1usize << (constraint_length - 1);
        let mut branch_outputs = Vec::with_capacity(num_states);
        let mut next_states = Vec::with_capacity(num_states);

        for state in 0..num_states {
            let mut outputs: [Vec<f32>; 2] = [Vec::new(), Vec::new()];
            let mut nexts = [0usize; 2];
            for input in 0..2u32 {
                let reg = (input << (constraint_length - 1)) | state as u32;
                outputs[input as usize] = generators
                    .iter()
                    .map(|&g| {
                        if (reg & g).count_ones() & 1 == 1 {
                            -1.0
                        } else {
                            1.0
                        }
                    })
                    .collect();
                nexts[input as usize] = ((reg >> 1) as usize) & (num_states - 1);
            }
            branch_outputs.push(outputs);
            next_states.push(nexts);
        }

        Self {
            constraint_length,
            rate_inv: generators.len(),
            num_states,
            branch_outputs,
            next_states,
        }
    }

    pub fn dab() -> Self {
        Self::new(DAB_CONSTRAINT_LENGTH, DAB_GENERATORS.to_vec())
    }

    pub fn rate_inv(&self) -> usize {
        self.rate_inv
    }

    /// Decode a terminated codeword (tail included). Returns the information
    /// bits with the K-1 tail bits removed.
    pub fn decode_terminated(&self, soft: &[f32]) -> Vec<u8> {
        let mut bits = self.run(soft, Some(0));
        let tail = self.constraint_length - 1;
        bits.truncate(bits.len().saturating_sub(tail));
        bits
    }

    /// Decode an unterminated stream, tracing back from the best end state.
    pub fn decode(&self, soft: &[f32]) -> Vec<u8> {
        self.run(soft, None)
    }

    fn run(&self, soft: &[f32], end_state: Option<usize>) -> Vec<u8> {
        let n = self.rate_inv;
        let num_steps = soft.len() / n;
        if num_steps == 0 {
            return Vec::new();
        }
        if soft.len() % n != 0 {
            trace!(
                "Ignoring {} trailing soft values (not a multiple of {})",
                soft.len() % n,
                n
            );
        }

        let mut path_metrics = vec![f32::INFINITY; self.num_states];
        path_metrics[0] = 0.0;
        let mut new_metrics = vec![f32::INFINITY; self.num_states];
        // predecessor state per step and state; the decision bit is the MSB of the
        // successor, so it is recovered from the state index during traceback
        let mut survivors: Vec<Vec<u16>> = Vec::with_capacity(num_steps);

        for step in 0..num_steps {
            let received = &soft[step * n..(step + 1) * n];
            new_metrics.fill(f32::INFINITY);
            let mut step_survivors = vec![0u16; self.num_states];

            for state in 0..self.num_states {
                let metric = path_metrics[state];
                if metric == f32::INFINITY {
                    continue;
                }
                for input in 0..2usize {
                    let next = self.next_states[state][input];
                    let expected = &self.branch_outputs[state][input];
                    let branch_metric: f32 = received
                        .iter()
                        .zip(expected.iter())
                        .map(|(r, e)| (r - e) * (r - e))
                        .sum();
                    let candidate = metric + branch_metric;
                    if candidate < new_metrics[next] {
                        new_metrics[next] = candidate;
                        step_survivors[next] = state as u16;
                    }
                }
            }

            std::mem::swap(&mut path_metrics, &mut new_metrics);
            survivors.push(step_survivors);
        }

        let mut current = match end_state {
            Some(s) => s,
            None => path_metrics
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(s, _)| s)
                .unwrap_or(0),
        };

        let msb = self.constraint_length - 2;
        let mut decoded = vec![0u8; num_steps];
        for step in (0..num_steps).rev() {
            decoded[step] = ((current >> msb) & 1) as u8;
            current = survivors[step][current] as usize;
        }
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_soft(bits: &[u8]) -> Vec<f32> {
        bits.iter()
            .map(|&b| if b == 1 { -1.0 } else { 1.0 })
            .collect()
    }

    #[test]
    fn test_encoder_impulse_response() {
        let mut encoder = ConvolutionalEncoder::dab();
        // A single one shifted through the register reproduces the taps
        let out = encoder.encode_terminated(&[1]);
        assert_eq!(out.len(), 7 * 4);
        let first: Vec<u8> = out[..4].to_vec();
        assert_eq!(first, vec![1, 1, 1, 1]);
        // a_{i-1}: only 0o171 and 0o145 tap the second stage
        assert_eq!(&out[4..8], &[0, 1, 1, 0]);
    }

    #[test]
    fn test_roundtrip_clean() {
        let data: Vec<u8> = (0..200).map(|i| ((i * 7 + 3) % 5 == 0) as u8).collect();
        let mut encoder = ConvolutionalEncoder::dab();
        let coded = encoder.encode_terminated(&data);
        let decoder = ViterbiDecoder::dab();
        assert_eq!(decoder.decode_terminated(&to_soft(&coded)), data);
    }

    #[test]
    fn test_corrects_errors_and_erasures() {
        let data: Vec<u8> = (0..128).map(|i| (i % 3 == 1) as u8).collect();
        let mut encoder = ConvolutionalEncoder::dab();
        let coded = encoder.encode_terminated(&data);
        let mut soft = to_soft(&coded);
        for i in (0..soft.len()).step_by(17) {
            soft[i] = -soft[i];
        }
        for i in (5..soft.len()).step_by(9) {
            soft[i] = 0.0;
        }
        let decoder = ViterbiDecoder::dab();
        assert_eq!(decoder.decode_terminated(&soft), data);
    }

    #[test]
    fn test_unterminated_decode() {
        let data = vec![1, 0, 1, 1, 0, 0, 1, 0, 1, 1, 1, 0];
        let mut encoder = ConvolutionalEncoder::dab();
        let coded = encoder.encode(&data);
        let decoded = ViterbiDecoder::dab().decode(&to_soft(&coded));
        assert_eq!(decoded, data);
    }
}
