//! Protocol helpers
//!
//! - Checksum algorithms used by line protocols
//! - NMEA 0183 sentence framing

pub mod checksum;
pub mod nmea;

pub use checksum::xor_checksum;
pub use nmea::{format_sentence as nmea_sentence, NMEA_LINE_ENDING};
