//! Serial port parameters
//!
//! `PortConfig` is the record the session opens a transport with. Values typed
//! by the operator are validated here; baud rate and parity are kept verbatim
//! and only rejected when a transport tries to apply them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default device path
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
/// Default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
/// Default read timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 1;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field value could not be parsed or is out of range
    #[error("invalid value {value:?} for {field}: {reason}")]
    InvalidArgument {
        /// Field being set
        field: PortField,
        /// Raw value typed by the user
        value: String,
        /// Why the value was refused
        reason: &'static str,
    },
}

impl ConfigError {
    fn invalid(field: PortField, value: &str, reason: &'static str) -> Self {
        Self::InvalidArgument {
            field,
            value: value.to_string(),
            reason,
        }
    }
}

/// Individually settable fields, in `serial_open` positional order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortField {
    /// Device path
    Port,
    /// Baud rate
    BaudRate,
    /// Data bits
    ByteSize,
    /// Parity
    Parity,
    /// Stop bits
    StopBits,
    /// XON/XOFF software flow control
    SoftFlowControl,
    /// RTS/CTS hardware flow control
    RtsCts,
    /// DSR/DTR hardware flow control
    DsrDtr,
    /// Read timeout
    Timeout,
}

impl PortField {
    /// Fields in the order `serial_open` expects them
    pub const POSITIONAL: [PortField; 9] = [
        PortField::Port,
        PortField::BaudRate,
        PortField::ByteSize,
        PortField::Parity,
        PortField::StopBits,
        PortField::SoftFlowControl,
        PortField::RtsCts,
        PortField::DsrDtr,
        PortField::Timeout,
    ];

    /// Short name used in messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Port => "port",
            Self::BaudRate => "baudrate",
            Self::ByteSize => "bytesize",
            Self::Parity => "parity",
            Self::StopBits => "stopbits",
            Self::SoftFlowControl => "xonxoff",
            Self::RtsCts => "rtscts",
            Self::DsrDtr => "dsrdtr",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for PortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serial parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    /// No parity
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
    /// Mark parity
    Mark,
    /// Space parity
    Space,
}

impl Parity {
    /// Single letter form (`N`, `E`, `O`, `M`, `S`)
    pub fn letter(&self) -> char {
        match self {
            Self::None => 'N',
            Self::Even => 'E',
            Self::Odd => 'O',
            Self::Mark => 'M',
            Self::Space => 'S',
        }
    }
}

impl FromStr for Parity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(Self::None),
            "E" => Ok(Self::Even),
            "O" => Ok(Self::Odd),
            "M" => Ok(Self::Mark),
            "S" => Ok(Self::Space),
            _ => Err(()),
        }
    }
}

/// Connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Device path (e.g. /dev/ttyUSB0, COM3)
    pub port: String,
    /// Baud rate as typed; parsed when applied
    pub baud_rate: String,
    /// Data bits (5, 6, 7, 8)
    pub byte_size: u8,
    /// Parity letter as typed; parsed when applied
    pub parity: String,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// XON/XOFF flow control
    pub xonxoff: bool,
    /// RTS/CTS flow control
    pub rtscts: bool,
    /// DSR/DTR flow control
    pub dsrdtr: bool,
    /// Read timeout in seconds, `None` blocks until a line arrives
    pub timeout: Option<u64>,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE.to_string(),
            byte_size: 8,
            parity: "N".to_string(),
            stop_bits: 1,
            xonxoff: false,
            rtscts: false,
            dsrdtr: false,
            timeout: Some(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl PortConfig {
    /// Parse `raw` and store it in `field`
    pub fn set_field(&mut self, field: PortField, raw: &str) -> Result<(), ConfigError> {
        match field {
            PortField::Port => self.port = raw.to_string(),
            PortField::BaudRate => self.baud_rate = raw.to_string(),
            PortField::Parity => self.parity = raw.to_string(),
            PortField::ByteSize => self.byte_size = parse_byte_size(raw)?,
            PortField::StopBits => self.stop_bits = parse_stop_bits(raw)?,
            PortField::SoftFlowControl => self.xonxoff = parse_bool(field, raw)?,
            PortField::RtsCts => self.rtscts = parse_bool(field, raw)?,
            PortField::DsrDtr => self.dsrdtr = parse_bool(field, raw)?,
            PortField::Timeout => self.timeout = parse_timeout(raw)?,
        }
        Ok(())
    }

    /// Assign whitespace separated values in positional order.
    ///
    /// Missing trailing values keep their current setting. If any value is
    /// malformed nothing is changed.
    pub fn apply_positional(&mut self, args: &str) -> Result<(), ConfigError> {
        let values: Vec<&str> = args.split_whitespace().collect();
        if values.len() > PortField::POSITIONAL.len() {
            tracing::warn!(
                "Ignoring {} extra serial_open argument(s)",
                values.len() - PortField::POSITIONAL.len()
            );
        }

        let mut updated = self.clone();
        for (field, value) in PortField::POSITIONAL.iter().zip(values) {
            updated.set_field(*field, value)?;
        }

        *self = updated;
        Ok(())
    }

    /// Restore compiled-in defaults
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Baud rate as a number
    pub fn baud_rate_value(&self) -> Result<u32, ConfigError> {
        parse_baud_rate(&self.baud_rate)
    }

    /// Parity as an enum
    pub fn parity_value(&self) -> Result<Parity, ConfigError> {
        parse_parity(&self.parity)
    }

    /// Timeout applied to every transport read
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    /// The nine values in `serial_open` order
    pub fn positional_args(&self) -> Vec<String> {
        vec![
            self.port.clone(),
            self.baud_rate.clone(),
            self.byte_size.to_string(),
            self.parity.clone(),
            self.stop_bits.to_string(),
            bool_literal(self.xonxoff).to_string(),
            bool_literal(self.rtscts).to_string(),
            bool_literal(self.dsrdtr).to_string(),
            self.timeout
                .map_or_else(|| "None".to_string(), |t| t.to_string()),
        ]
    }
}

impl fmt::Display for PortConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.positional_args().join(" "))
    }
}

/// Parse a baud rate typed by the user
pub fn parse_baud_rate(raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(ConfigError::invalid(PortField::BaudRate, raw, "must be positive")),
        Ok(baud) => Ok(baud),
        Err(_) => Err(ConfigError::invalid(PortField::BaudRate, raw, "not an integer")),
    }
}

/// Parse a parity letter
pub fn parse_parity(raw: &str) -> Result<Parity, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|()| ConfigError::invalid(PortField::Parity, raw, "expected one of N, E, O, M, S"))
}

/// Parse a data bits value
pub fn parse_byte_size(raw: &str) -> Result<u8, ConfigError> {
    let bits: u8 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(PortField::ByteSize, raw, "not an integer"))?;
    if (5..=8).contains(&bits) {
        Ok(bits)
    } else {
        Err(ConfigError::invalid(PortField::ByteSize, raw, "expected 5, 6, 7 or 8"))
    }
}

/// Parse a stop bits value
pub fn parse_stop_bits(raw: &str) -> Result<u8, ConfigError> {
    let bits: u8 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(PortField::StopBits, raw, "not an integer"))?;
    if bits == 1 || bits == 2 {
        Ok(bits)
    } else {
        Err(ConfigError::invalid(PortField::StopBits, raw, "expected 1 or 2"))
    }
}

/// Parse a timeout in whole seconds, or `None` for no timeout
pub fn parse_timeout(raw: &str) -> Result<Option<u64>, ConfigError> {
    let raw_trimmed = raw.trim();
    if raw_trimmed == "None" {
        return Ok(None);
    }
    raw_trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::invalid(PortField::Timeout, raw, "not a non-negative integer"))
}

/// Strict boolean literal: only `True` or `False`
pub fn parse_bool(field: PortField, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim() {
        "True" => Ok(true),
        "False" => Ok(false),
        _ => Err(ConfigError::invalid(field, raw, "expected True or False")),
    }
}

fn bool_literal(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PortConfig::default();
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate_value(), Ok(115_200));
        assert_eq!(config.byte_size, 8);
        assert_eq!(config.parity_value(), Ok(Parity::None));
        assert_eq!(config.stop_bits, 1);
        assert!(!config.xonxoff && !config.rtscts && !config.dsrdtr);
        assert_eq!(config.timeout, Some(1));
    }

    #[test]
    fn test_positional_full() {
        let mut config = PortConfig::default();
        config
            .apply_positional("/dev/ttyACM1 9600 7 E 2 True False True 5")
            .unwrap();
        assert_eq!(config.port, "/dev/ttyACM1");
        assert_eq!(config.baud_rate, "9600");
        assert_eq!(config.byte_size, 7);
        assert_eq!(config.parity, "E");
        assert_eq!(config.stop_bits, 2);
        assert!(config.xonxoff);
        assert!(!config.rtscts);
        assert!(config.dsrdtr);
        assert_eq!(config.timeout, Some(5));
    }

    #[test]
    fn test_positional_partial_keeps_rest() {
        let mut config = PortConfig::default();
        config.apply_positional("/dev/ttyS3 4800").unwrap();
        assert_eq!(config.port, "/dev/ttyS3");
        assert_eq!(config.baud_rate, "4800");
        assert_eq!(config.byte_size, 8);
        assert_eq!(config.timeout, Some(1));

        config.apply_positional("").unwrap();
        assert_eq!(config.port, "/dev/ttyS3");
    }

    #[test]
    fn test_positional_malformed_is_atomic() {
        let mut config = PortConfig::default();
        let err = config.apply_positional("/dev/ttyS3 9600 eight").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidArgument { field: PortField::ByteSize, .. }
        ));
        assert_eq!(config, PortConfig::default());
    }

    #[test]
    fn test_bool_is_strict() {
        let mut config = PortConfig::default();
        assert!(config.set_field(PortField::RtsCts, "true").is_err());
        assert!(config.set_field(PortField::RtsCts, "1").is_err());
        assert!(config.set_field(PortField::RtsCts, "__import__('os')").is_err());
        config.set_field(PortField::RtsCts, "True").unwrap();
        assert!(config.rtscts);
    }

    #[test]
    fn test_numeric_fields() {
        let mut config = PortConfig::default();
        assert!(config.set_field(PortField::StopBits, "1.5").is_err());
        assert!(config.set_field(PortField::ByteSize, "9").is_err());
        assert!(config.set_field(PortField::Timeout, "-1").is_err());
        config.set_field(PortField::Timeout, "None").unwrap();
        assert_eq!(config.timeout_duration(), None);
        config.set_field(PortField::Timeout, "0").unwrap();
        assert_eq!(config.timeout_duration(), Some(Duration::ZERO));
    }

    #[test]
    fn test_baud_and_parity_checked_lazily() {
        let mut config = PortConfig::default();
        config.apply_positional("/dev/ttyUSB0 fast 8 X").unwrap();
        assert!(config.baud_rate_value().is_err());
        assert!(config.parity_value().is_err());
    }

    #[test]
    fn test_reset_and_round_trip() {
        let mut config = PortConfig::default();
        config.apply_positional("/dev/ttyS0 57600 7 O 2 True True False None").unwrap();
        let args = config.positional_args().join(" ");
        let mut copy = PortConfig::default();
        copy.apply_positional(&args).unwrap();
        assert_eq!(copy, config);

        config.reset();
        assert_eq!(config, PortConfig::default());
    }
}
