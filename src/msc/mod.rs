//! Main Service Channel: frame assembly, channel decoding and the matching
//! transmitter chain.

pub mod assembler;
pub mod decoder;
pub mod encoder;

pub use assembler::{FrameAssembler, select_subchannel};
pub use decoder::{LogicalFrame, MscDecode, MscDecoder, MscStats};
pub use encoder::MscEncoder;
