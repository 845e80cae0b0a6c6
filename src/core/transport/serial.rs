//! Serial port transport implementation

use super::{Connector, Transport, TransportError};
use crate::core::interrupt::Interrupt;
use crate::core::port_config::{Parity, PortConfig};
use serialport::{DataBits, FlowControl, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

/// Longest single blocking read; the interrupt is polled in between
const POLL_SLICE: Duration = Duration::from_millis(100);

/// A line this long is handed back even without a terminator
const MAX_LINE_BYTES: usize = 4096;

/// Opens real serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn open(&self, config: &PortConfig) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(SerialTransport::open(config)?))
    }
}

/// Serial port transport
pub struct SerialTransport {
    name: String,
    port: Option<Box<dyn SerialPort>>,
    pending: Vec<u8>,
    timeout: Option<Duration>,
}

impl SerialTransport {
    /// Open the port described by `config`
    pub fn open(config: &PortConfig) -> Result<Self, TransportError> {
        let baud_rate = config.baud_rate_value()?;
        let parity = to_serial_parity(config.parity_value()?)?;
        let data_bits = to_data_bits(config.byte_size)?;
        let stop_bits = to_stop_bits(config.stop_bits)?;
        let flow_control = flow_control(config)?;
        let timeout = config.timeout_duration();

        let port = serialport::new(&config.port, baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control)
            .timeout(poll_slice(timeout))
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => {
                    TransportError::PortNotFound(config.port.clone())
                }
                serialport::ErrorKind::InvalidInput => {
                    TransportError::InvalidConfiguration(e.to_string())
                }
                serialport::ErrorKind::Io(io_kind) => match io_kind {
                    std::io::ErrorKind::NotFound => {
                        TransportError::PortNotFound(config.port.clone())
                    }
                    std::io::ErrorKind::PermissionDenied => {
                        TransportError::PermissionDenied(config.port.clone())
                    }
                    _ => TransportError::ConnectionFailed(e.to_string()),
                },
                _ => TransportError::ConnectionFailed(e.to_string()),
            })?;

        Ok(Self {
            name: config.port.clone(),
            port: Some(port),
            pending: Vec::new(),
            timeout,
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::Disconnected)
    }
}

impl Transport for SerialTransport {
    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        // Dropping the handle closes the file descriptor
        self.port = None;
        self.pending.clear();
        Ok(())
    }

    fn read_line(&mut self, interrupt: &Interrupt) -> Result<String, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Disconnected)?;
        read_line_from(&mut **port, &mut self.pending, self.timeout, interrupt)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let port = self.port_mut()?;
        let written = port.write(data)?;
        port.flush()?;
        Ok(written)
    }

    fn port_name(&self) -> String {
        self.name.clone()
    }

    fn baud_rate(&self) -> Result<u32, TransportError> {
        let port = self.port.as_ref().ok_or(TransportError::Disconnected)?;
        port.baud_rate().map_err(serial_error)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        self.port_mut()?.set_baud_rate(baud_rate).map_err(serial_error)
    }

    fn set_byte_size(&mut self, bits: u8) -> Result<(), TransportError> {
        let data_bits = to_data_bits(bits)?;
        self.port_mut()?.set_data_bits(data_bits).map_err(serial_error)
    }

    fn set_parity(&mut self, parity: Parity) -> Result<(), TransportError> {
        let parity = to_serial_parity(parity)?;
        self.port_mut()?.set_parity(parity).map_err(serial_error)
    }

    fn set_stop_bits(&mut self, bits: u8) -> Result<(), TransportError> {
        let stop_bits = to_stop_bits(bits)?;
        self.port_mut()?.set_stop_bits(stop_bits).map_err(serial_error)
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.port_mut()?
            .set_timeout(poll_slice(timeout))
            .map_err(serial_error)?;
        self.timeout = timeout;
        Ok(())
    }

    fn info(&self) -> String {
        let Some(port) = self.port.as_ref() else {
            return format!("{} (closed)", self.name);
        };

        let baud = port.baud_rate().map_or_else(|_| "?".to_string(), |b| b.to_string());
        let bits = match port.data_bits() {
            Ok(DataBits::Five) => "5",
            Ok(DataBits::Six) => "6",
            Ok(DataBits::Seven) => "7",
            Ok(DataBits::Eight) => "8",
            Err(_) => "?",
        };
        let parity = match port.parity() {
            Ok(serialport::Parity::None) => "N",
            Ok(serialport::Parity::Odd) => "O",
            Ok(serialport::Parity::Even) => "E",
            Err(_) => "?",
        };
        let stop = match port.stop_bits() {
            Ok(StopBits::One) => "1",
            Ok(StopBits::Two) => "2",
            Err(_) => "?",
        };
        let flow = match port.flow_control() {
            Ok(FlowControl::None) => "no flow control",
            Ok(FlowControl::Software) => "XON/XOFF",
            Ok(FlowControl::Hardware) => "RTS/CTS",
            Err(_) => "unknown flow control",
        };
        let timeout = match self.timeout {
            Some(timeout) => format!("timeout {}s", timeout.as_secs_f32()),
            None => "no timeout".to_string(),
        };

        format!(
            "{} @ {} baud ({}{}{}, {}, {})",
            self.name, baud, bits, parity, stop, flow, timeout
        )
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(serial_error)
}

/// Read up to the next `\n` from `reader`.
///
/// Blocks in slices of at most [`POLL_SLICE`]. Gives up with whatever partial
/// line arrived once `timeout` has passed in total, and with an empty line as
/// soon as `interrupt` is raised. `None` waits until a line or an interrupt.
fn read_line_from<R: Read + ?Sized>(
    reader: &mut R,
    pending: &mut Vec<u8>,
    timeout: Option<Duration>,
    interrupt: &Interrupt,
) -> Result<String, TransportError> {
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut buffer = [0u8; 256];
    loop {
        if let Some(line) = take_line(pending) {
            return Ok(line);
        }
        if pending.len() >= MAX_LINE_BYTES {
            tracing::debug!("No line terminator in {} bytes", pending.len());
            return Ok(decode_line(&std::mem::take(pending)));
        }

        match reader.read(&mut buffer) {
            Ok(0) => return Ok(decode_line(&std::mem::take(pending))),
            Ok(n) => pending.extend_from_slice(&buffer[..n]),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
            Err(e) => return Err(TransportError::IoError(e)),
        }

        if interrupt.is_set() {
            pending.clear();
            return Ok(String::new());
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(decode_line(&std::mem::take(pending)));
        }
    }
}

/// Take one line out of `pending`, if a terminator is there
fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let pos = pending.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = pending.drain(..=pos).collect();
    Some(decode_line(&line))
}

/// Port-level timeout for one read slice
fn poll_slice(timeout: Option<Duration>) -> Duration {
    timeout.map_or(POLL_SLICE, |t| t.min(POLL_SLICE))
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_string()
}

fn serial_error(e: serialport::Error) -> TransportError {
    TransportError::IoError(e.into())
}

fn to_data_bits(bits: u8) -> Result<DataBits, TransportError> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(TransportError::InvalidConfiguration(format!(
            "unsupported byte size {other}"
        ))),
    }
}

fn to_stop_bits(bits: u8) -> Result<StopBits, TransportError> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(TransportError::InvalidConfiguration(format!(
            "unsupported stop bits {other}"
        ))),
    }
}

fn to_serial_parity(parity: Parity) -> Result<serialport::Parity, TransportError> {
    match parity {
        Parity::None => Ok(serialport::Parity::None),
        Parity::Odd => Ok(serialport::Parity::Odd),
        Parity::Even => Ok(serialport::Parity::Even),
        Parity::Mark | Parity::Space => Err(TransportError::InvalidConfiguration(format!(
            "parity {} is not supported by the serial backend",
            parity.letter()
        ))),
    }
}

fn flow_control(config: &PortConfig) -> Result<FlowControl, TransportError> {
    if config.dsrdtr {
        return Err(TransportError::InvalidConfiguration(
            "DSR/DTR flow control is not supported by the serial backend".to_string(),
        ));
    }
    match (config.xonxoff, config.rtscts) {
        (false, false) => Ok(FlowControl::None),
        (true, false) => Ok(FlowControl::Software),
        (false, true) => Ok(FlowControl::Hardware),
        (true, true) => Err(TransportError::InvalidConfiguration(
            "XON/XOFF and RTS/CTS flow control cannot be combined".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// A port that never delivers: every read waits `delay`, then times out
    struct SilentPort {
        delay: Duration,
        reads: usize,
    }

    impl Read for SilentPort {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            thread::sleep(self.delay);
            self.reads += 1;
            Err(ErrorKind::TimedOut.into())
        }
    }

    /// A port streaming the same byte forever without a terminator
    struct Babbler;

    impl Read for Babbler {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            buf.fill(b'A');
            Ok(buf.len())
        }
    }

    #[test]
    fn test_blocked_read_without_timeout_honours_interrupt() {
        let interrupt = Interrupt::new();
        let handler_side = interrupt.clone();
        let ctrl_c = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handler_side.trigger();
        });

        let mut port = SilentPort {
            delay: Duration::from_millis(10),
            reads: 0,
        };
        let mut pending = b"partial".to_vec();
        let started = Instant::now();
        let line = read_line_from(&mut port, &mut pending, None, &interrupt).unwrap();
        ctrl_c.join().unwrap();

        assert_eq!(line, "");
        assert!(pending.is_empty());
        assert!(port.reads >= 1);
        assert!(started.elapsed() < Duration::from_secs(5));
        // Left for the read loop to consume
        assert!(interrupt.is_set());
    }

    #[test]
    fn test_timeout_is_a_total_deadline() {
        let mut port = SilentPort {
            delay: Duration::from_millis(5),
            reads: 0,
        };
        let mut pending = b"AT+C".to_vec();
        let started = Instant::now();
        let line = read_line_from(
            &mut port,
            &mut pending,
            Some(Duration::from_millis(30)),
            &Interrupt::new(),
        )
        .unwrap();

        assert_eq!(line, "AT+C");
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(port.reads > 1);
    }

    #[test]
    fn test_unterminated_stream_is_cut() {
        let mut pending = Vec::new();
        let line = read_line_from(&mut Babbler, &mut pending, None, &Interrupt::new()).unwrap();
        assert_eq!(line.len(), MAX_LINE_BYTES);
    }

    #[test]
    fn test_buffered_lines_come_first() {
        let mut pending = b"OK\r\n+CSQ: 20,99\r\n".to_vec();
        let interrupt = Interrupt::new();
        let mut port = SilentPort {
            delay: Duration::ZERO,
            reads: 0,
        };
        assert_eq!(
            read_line_from(&mut port, &mut pending, None, &interrupt).unwrap(),
            "OK"
        );
        assert_eq!(
            read_line_from(&mut port, &mut pending, None, &interrupt).unwrap(),
            "+CSQ: 20,99"
        );
        assert_eq!(port.reads, 0);
    }

    #[test]
    fn test_poll_slice_caps_port_timeout() {
        assert_eq!(poll_slice(None), POLL_SLICE);
        assert_eq!(poll_slice(Some(Duration::from_secs(5))), POLL_SLICE);
        assert_eq!(
            poll_slice(Some(Duration::from_millis(20))),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn test_flow_control_mapping() {
        let mut config = PortConfig::default();
        assert_eq!(flow_control(&config).unwrap(), FlowControl::None);
        config.rtscts = true;
        assert_eq!(flow_control(&config).unwrap(), FlowControl::Hardware);
        config.xonxoff = true;
        assert!(flow_control(&config).is_err());
        config.rtscts = false;
        assert_eq!(flow_control(&config).unwrap(), FlowControl::Software);
        config.dsrdtr = true;
        assert!(flow_control(&config).is_err());
    }

    #[test]
    fn test_parity_mapping() {
        assert_eq!(to_serial_parity(Parity::Even).unwrap(), serialport::Parity::Even);
        assert!(to_serial_parity(Parity::Mark).is_err());
        assert!(to_serial_parity(Parity::Space).is_err());
    }

    #[test]
    fn test_decode_line_strips_terminators() {
        assert_eq!(decode_line(b"OK\r\n"), "OK");
        assert_eq!(decode_line(b"\r\n"), "");
        assert_eq!(decode_line(b"+CSQ: 20,99  \n"), "+CSQ: 20,99");
    }

    #[test]
    fn test_open_rejects_bad_parameters_before_touching_device() {
        let mut config = PortConfig::default();
        config.port = "/dev/does-not-exist".to_string();
        config.baud_rate = "fast".to_string();
        assert!(matches!(
            SerialTransport::open(&config),
            Err(TransportError::InvalidConfiguration(_))
        ));

        config.baud_rate = "9600".to_string();
        config.parity = "M".to_string();
        assert!(matches!(
            SerialTransport::open(&config),
            Err(TransportError::InvalidConfiguration(_))
        ));
    }
}
