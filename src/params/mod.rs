// Transmission parameters: mode geometry and subchannel protection

pub mod mode;
pub mod subchannel;

pub use mode::{DabMode, DabParameters, channel_frequency_hz, channel_label};
pub use subchannel::{Protection, PuncturingProfile, Subchannel};
