// Channel coding of the Main Service Channel and the DAB+ outer code

pub mod convolutional;
pub mod crc;
pub mod energy_dispersal;
pub mod puncture;
pub mod reed_solomon;
pub mod time_interleave;

pub use convolutional::{ConvolutionalEncoder, ViterbiDecoder};
pub use reed_solomon::{CorrectionReport, SuperframeReedSolomon};
pub use time_interleave::{TimeDeinterleaver, TimeInterleaver};
