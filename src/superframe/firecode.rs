use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::error_correction::crc::verify_firecode;
use crate::utils::consts::FRAMES_PER_SUPERFRAME;
use crate::utils::error::{DabError, Result};

/// Outcome of checking the firecode at one logical frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirecodeVerdict {
    pub frame_index: usize,
    pub ok: bool,
}

/// Everything the checker saw during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirecodeReport {
    pub frames_received: usize,
    pub frames_checked: usize,
    pub frames_dropped: usize,
    pub superframes: usize,
    pub ok_frames: Vec<usize>,
    pub verdicts: Vec<FirecodeVerdict>,
}

impl FirecodeReport {
    fn record(&mut self, verdict: FirecodeVerdict) {
        self.frames_checked += 1;
        if verdict.ok {
            self.ok_frames.push(verdict.frame_index);
            self.superframes += 1;
        } else {
            self.frames_dropped += 1;
        }
        self.verdicts.push(verdict);
    }

    pub fn first_sync(&self) -> Option<usize> {
        self.ok_frames.first().copied()
    }

    /// True when the checker found at least one superframe and, from the
    /// first one on, every check passed exactly five frames after the last.
    pub fn follows_superframe_cadence(&self) -> bool {
        let Some(first) = self.first_sync() else {
            return false;
        };
        let after_sync = self
            .verdicts
            .iter()
            .skip_while(|v| v.frame_index < first);
        let mut expected = first;
        for verdict in after_sync {
            if !verdict.ok || verdict.frame_index != expected {
                return false;
            }
            expected += FRAMES_PER_SUPERFRAME;
        }
        true
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Superframe synchronisation on the firecode of DAB+ subchannels.
///
/// Logical frames are buffered; whenever five are available the oldest is
/// tested. On success the five frames leave as one superframe, otherwise the
/// oldest frame is discarded and the search continues one frame later.
pub struct FirecodeChecker {
    frame_len: usize,
    buffer: VecDeque<(usize, Vec<u8>)>,
    next_index: usize,
    report: FirecodeReport,
}

impl FirecodeChecker {
    /// `bit_rate_n` is the subchannel bit rate divided by 8 kbit/s
    pub fn new(bit_rate_n: usize) -> Self {
        Self {
            frame_len: 24 * bit_rate_n,
            buffer: VecDeque::with_capacity(FRAMES_PER_SUPERFRAME),
            next_index: 0,
            report: FirecodeReport::default(),
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn superframe_len(&self) -> usize {
        self.frame_len * FRAMES_PER_SUPERFRAME
    }

    pub fn push(&mut self, frame: &[u8]) -> Result<Vec<Vec<u8>>> {
        if frame.len() != self.frame_len {
            return Err(DabError::stream(format!(
                "logical frame of {} bytes, firecode checker expects {}",
                frame.len(),
                self.frame_len
            )));
        }
        self.buffer.push_back((self.next_index, frame.to_vec()));
        self.next_index += 1;
        self.report.frames_received += 1;

        let mut superframes = Vec::new();
        while self.buffer.len() >= FRAMES_PER_SUPERFRAME {
            let (index, ok) = match self.buffer.front() {
                Some((index, head)) => (*index, verify_firecode(head)),
                None => break,
            };
            self.report.record(FirecodeVerdict {
                frame_index: index,
                ok,
            });

            if ok {
                let mut superframe = Vec::with_capacity(self.superframe_len());
                for (_, frame) in self.buffer.drain(..FRAMES_PER_SUPERFRAME) {
                    superframe.extend_from_slice(&frame);
                }
                debug!("Firecode OK at frame {}", index);
                superframes.push(superframe);
            } else {
                if self.report.superframes > 0 {
                    warn!("Firecode failed at frame {}, lost superframe sync", index);
                } else {
                    debug!("Firecode failed at frame {}", index);
                }
                self.buffer.pop_front();
            }
        }
        Ok(superframes)
    }

    pub fn report(&self) -> &FirecodeReport {
        &self.report
    }

    pub fn into_report(self) -> FirecodeReport {
        info!(
            "Firecode: {} frames, {} checked, {} superframes, {} dropped",
            self.report.frames_received,
            self.report.frames_checked,
            self.report.superframes,
            self.report.frames_dropped
        );
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_correction::crc::insert_firecode;

    const N: usize = 2;

    fn superframe(seed: u8) -> Vec<Vec<u8>> {
        let mut sf: Vec<u8> = (0..24 * N * 5)
            .map(|i| (i as u8).wrapping_mul(seed).wrapping_add(seed | 1))
            .collect();
        insert_firecode(&mut sf);
        sf.chunks(24 * N).map(|c| c.to_vec()).collect()
    }

    fn garbage(seed: u8) -> Vec<u8> {
        let mut frame: Vec<u8> = (0..24 * N).map(|i| (i as u8) ^ seed).collect();
        frame[0] = !frame[0];
        frame[1] = 0x55;
        frame
    }

    #[test]
    fn test_sync_after_garbage() {
        let mut checker = FirecodeChecker::new(N);
        let mut out = Vec::new();
        for g in 0..3 {
            out.extend(checker.push(&garbage(g)).unwrap());
        }
        for s in 1..=3 {
            for frame in superframe(s) {
                out.extend(checker.push(&frame).unwrap());
            }
        }
        assert_eq!(out.len(), 3);
        let report = checker.report();
        assert_eq!(report.ok_frames, vec![3, 8, 13]);
        assert_eq!(report.frames_dropped, 3);
        assert!(report.follows_superframe_cadence());
        assert_eq!(out[0].len(), checker.superframe_len());
    }

    #[test]
    fn test_sync_loss_breaks_cadence() {
        let mut checker = FirecodeChecker::new(N);
        for frame in superframe(3) {
            checker.push(&frame).unwrap();
        }
        checker.push(&garbage(1)).unwrap();
        for frame in superframe(5) {
            checker.push(&frame).unwrap();
        }
        let report = checker.report();
        assert_eq!(report.ok_frames, vec![0, 6]);
        assert!(!report.follows_superframe_cadence());
    }

    #[test]
    fn test_no_sync() {
        let mut checker = FirecodeChecker::new(N);
        for g in 0..8 {
            checker.push(&garbage(g)).unwrap();
        }
        assert!(!checker.report().follows_superframe_cadence());
        assert_eq!(checker.report().frames_checked, 4);
    }

    #[test]
    fn test_wrong_frame_length() {
        let mut checker = FirecodeChecker::new(N);
        assert!(checker.push(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_report_json() {
        let mut checker = FirecodeChecker::new(N);
        for frame in superframe(7) {
            checker.push(&frame).unwrap();
        }
        let json = checker.report().to_json().unwrap();
        let back: FirecodeReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ok_frames, vec![0]);
    }
}
