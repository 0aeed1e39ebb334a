// CRC16 (ETSI EN 300 401) and the DAB+ superframe firecode
// CRC16: x^16 + x^12 + x^5 + 1 (0x1021), register preset to 0xFFFF, sent inverted
// Firecode: x^16 + x^14 + x^13 + x^12 + x^11 + x^5 + x^3 + x^2 + x + 1 (0x782F)

const CRC16_POLYNOMIAL: u16 = 0x1021;
const FIRECODE_POLYNOMIAL: u16 = 0x782F;

/// Superframe bytes covered by the firecode (the two code bytes precede them)
const FIRECODE_COVERED: std::ops::Range<usize> = 2..11;

fn crc16_update(mut crc: u16, poly: u16, data: &[u8]) -> u16 {
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ poly;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// CRC16 word as transmitted (already inverted)
pub fn calculate_crc16(data: &[u8]) -> u16 {
    !crc16_update(0xFFFF, CRC16_POLYNOMIAL, data)
}

/// Verify a buffer whose last two bytes are the CRC16 of the bytes before
pub fn verify_crc16(data_with_crc: &[u8]) -> bool {
    if data_with_crc.len() < 2 {
        return false;
    }
    let (data, crc) = data_with_crc.split_at(data_with_crc.len() - 2);
    calculate_crc16(data) == u16::from_be_bytes([crc[0], crc[1]])
}

/// Append the CRC16 of `data` to it
pub fn append_crc16(data: &mut Vec<u8>) {
    let crc = calculate_crc16(data);
    data.extend_from_slice(&crc.to_be_bytes());
}

/// Firecode over bytes 2..11 of a superframe
pub fn calculate_firecode(superframe: &[u8]) -> u16 {
    crc16_update(0x0000, FIRECODE_POLYNOMIAL, &superframe[FIRECODE_COVERED])
}

/// Check the firecode stored in the first two bytes of a superframe
pub fn verify_firecode(superframe: &[u8]) -> bool {
    if superframe.len() < FIRECODE_COVERED.end {
        return false;
    }
    calculate_firecode(superframe) == u16::from_be_bytes([superframe[0], superframe[1]])
}

/// Write the firecode into the first two bytes of a superframe
pub fn insert_firecode(superframe: &mut [u8]) {
    let code = calculate_firecode(superframe).to_be_bytes();
    superframe[..2].copy_from_slice(&code);
}

/// Convert byte to bit array (MSB first)
pub fn byte_to_bits(byte: u8) -> [u8; 8] {
    let mut bits = [0u8; 8];
    for i in 0..8 {
        bits[i] = (byte >> (7 - i)) & 1;
    }
    bits
}

/// Convert bit array to byte (MSB first)
pub fn bits_to_byte(bits: &[u8]) -> u8 {
    let mut byte = 0u8;
    for (i, &bit) in bits
        .iter()
        .enumerate()
        .take(8)
    {
        if bit != 0 {
            byte |= 1 << (7 - i);
        }
    }
    byte
}

/// Convert bytes to bit vector
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        bits.extend_from_slice(&byte_to_bits(byte));
    }
    bits
}

/// Convert bit vector to bytes
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(bits_to_byte)
        .collect()
}
