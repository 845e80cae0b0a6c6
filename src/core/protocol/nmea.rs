//! NMEA 0183 sentence framing
//!
//! A sentence on the wire is `$<body>*<CC>\r\n` where `CC` is the XOR of every
//! byte of the body, as two uppercase hex digits.

use super::checksum::{hex_byte, xor_checksum};

/// Line terminator for NMEA sentences
pub const NMEA_LINE_ENDING: &str = "\r\n";

/// Checksum of a sentence body
pub fn checksum(body: &str) -> u8 {
    xor_checksum(body.as_bytes())
}

/// Checksum formatted as it appears after `*`
pub fn checksum_hex(body: &str) -> String {
    hex_byte(checksum(body))
}

/// `$<body>*<CC>`, without the line ending
pub fn format_sentence(body: &str) -> String {
    format!("${}*{}", body, checksum_hex(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_matches_manual_xor() {
        let body = "GPGGA,1,2,3";
        let expected = body.bytes().fold(0u8, |acc, b| acc ^ b);
        assert_eq!(checksum(body), expected);
        assert_eq!(checksum_hex(body), "4A");
        assert_eq!(checksum_hex(body), checksum_hex(body));
    }

    #[test]
    fn test_known_sentence() {
        // 1 Hz fix rate command for MediaTek receivers
        assert_eq!(format_sentence("PMTK220,1000"), "$PMTK220,1000*1F");
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(format_sentence(""), "$*00");
    }
}
