//! Checksum helpers for line protocols

/// XOR of all bytes
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Checksum byte as two uppercase hex digits
pub fn hex_byte(value: u8) -> String {
    hex::encode_upper([value])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor() {
        assert_eq!(xor_checksum(&[0x01, 0x02, 0x03]), 0x00);
        assert_eq!(xor_checksum(&[0xFF, 0x00]), 0xFF);
        assert_eq!(xor_checksum(&[]), 0x00);
    }

    #[test]
    fn test_hex_byte_is_padded_uppercase() {
        assert_eq!(hex_byte(0x0a), "0A");
        assert_eq!(hex_byte(0xff), "FF");
        assert_eq!(hex_byte(0), "00");
    }
}
