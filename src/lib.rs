//! DAB/DAB+ Main Service Channel decoding: from demodulated OFDM symbols
//! down to firecode checked superframes, access units and PAD.

pub mod dqpsk;
pub mod error_correction;
pub mod flowgraph;
pub mod msc;
pub mod pad;
pub mod params;
pub mod superframe;
pub mod synth;
pub mod ui;
pub mod utils;

pub use flowgraph::{MscFlowgraph, RunSummary};
pub use utils::config::ReceiverConfig;
pub use utils::error::{DabError, Result};
