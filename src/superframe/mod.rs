//! DAB+ superframes: firecode synchronisation, audio format, access units.

pub mod builder;
pub mod decoder;
pub mod firecode;
pub mod format;

pub use builder::SuperframeBuilder;
pub use decoder::{AccessUnit, DecodedSuperframe, SuperframeDecoder, SuperframeStats};
pub use firecode::{FirecodeChecker, FirecodeReport, FirecodeVerdict};
pub use format::AudioFormat;
