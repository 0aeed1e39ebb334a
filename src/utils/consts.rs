/// 日志级别（可被 RUST_LOG 覆盖）
pub const LOG_LEVEL: &str = "info";

/// 进度更新间隔（毫秒）
pub const PROGRESS_UPDATE_INTERVAL_MS: u64 = 50;

// ============================================================================
// Harness defaults (mode I, channel 9D, 120 kbit/s EEP 3-A subchannel)
// ============================================================================

pub const DEFAULT_MODE: u8 = 1;
pub const DEFAULT_FREQUENCY_HZ: f64 = 208.064e6;
pub const DEFAULT_SUBCH_ADDRESS: usize = 54;
pub const DEFAULT_SUBCH_SIZE: usize = 90;
pub const DEFAULT_PROTECTION: u8 = 2;
pub const DEFAULT_BIT_RATE_N: usize = 15;

pub const DEFAULT_DEBUG_DIR: &str = "debug";
pub const TRANSMISSION_FRAME_FILE: &str = "transmission_frame.dat";
pub const TRANSMISSION_TRIGGER_FILE: &str = "transmission_frame_trigger.dat";
pub const CHECKED_FIRECODE_FILE: &str = "checked_firecode.dat";
pub const MSC_SUBCHANNEL_DEBUG_FILE: &str = "msc_subchannel.dat";
pub const MSC_DECODED_DEBUG_FILE: &str = "msc_decoded.dat";

// ============================================================================
// Transmission frame layout (ETSI EN 300 401)
// ============================================================================

/// Bits in one Common Interleaved Frame
pub const CIF_BITS: usize = 55296;

/// Capacity units per CIF
pub const CIF_CAPACITY_UNITS: usize = 864;

/// Bits per capacity unit
pub const CU_BITS: usize = 64;

/// Duration of one logical frame (ms)
pub const LOGICAL_FRAME_MS: usize = 24;

/// Memory of the mother convolutional code (K - 1)
pub const CONV_MEMORY: usize = 6;

/// Outputs per input bit of the mother code
pub const CONV_RATE_INV: usize = 4;

/// Input bits covered by one puncturing block (128 mother code bits)
pub const PUNCTURE_BLOCK_INPUT_BITS: usize = 32;

/// Bits kept from the 24 tail bits
pub const TAIL_PUNCTURED_BITS: usize = 12;

/// Depth of the time interleaver (CIFs)
pub const TIME_INTERLEAVING_DEPTH: usize = 16;

// ============================================================================
// DAB+ superframe (ETSI TS 102 563)
// ============================================================================

/// Logical frames per superframe
pub const FRAMES_PER_SUPERFRAME: usize = 5;

/// RS codeword length and parity length per column
pub const RS_CODEWORD_LEN: usize = 120;
pub const RS_PARITY_LEN: usize = 10;

/// Upper bound for a single AU payload
pub const MAX_AU_PAYLOAD: usize = 960;

/// Superframe header byte holding the audio parameters
pub const SUPERFRAME_FORMAT_BYTE: usize = 2;
