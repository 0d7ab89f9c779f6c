//! Serial port communication implementation
//!
//! Provides the line-oriented transport to the stage firmware over USB
//! serial.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Baud rate configuration
//! - Blocking line reads with no overall deadline

use stackshot_core::LinkError;
use std::io::{self, BufRead, BufReader, Write};
use std::time::Duration;

/// Poll interval of the underlying port; reads keep retrying past it.
const READ_POLL: Duration = Duration::from_millis(100);

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,
}

/// List serial ports that look like a printer controller board
///
/// Filters to the usual USB serial patterns:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>, LinkError> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        LinkError::FailedToOpen {
            port: "*".to_string(),
            reason: e.to_string(),
        }
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_valid_stage_port(&port.port_name))
        .map(|port| SerialPortInfo {
            port_name: port.port_name.clone(),
            description: get_port_description(port),
        })
        .collect())
}

fn is_valid_stage_port(port_name: &str) -> bool {
    if let Some(suffix) = port_name.strip_prefix("COM") {
        return !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}

fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Line-oriented port to the stage firmware
pub trait StagePort: Send {
    /// Write one complete line (terminator included)
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Read one line including its terminator
    ///
    /// Blocks until a full line arrives. Returns `Ok(None)` once the peer
    /// has closed the stream.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Get the port name
    fn name(&self) -> String;
}

/// Real serial port implementation using serialport crate
pub struct RealSerialPort {
    name: String,
    reader: BufReader<Box<dyn serialport::SerialPort>>,
}

impl RealSerialPort {
    /// Open a serial port at the given baud rate
    pub fn open(port: &str, baud_rate: u32) -> Result<Self, LinkError> {
        let native = serialport::new(port, baud_rate)
            .timeout(READ_POLL)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", port, e);
                LinkError::FailedToOpen {
                    port: port.to_string(),
                    reason: e.to_string(),
                }
            })?;

        tracing::info!("Opened stage port {} at {} baud", port, baud_rate);
        Ok(Self {
            name: port.to_string(),
            reader: BufReader::new(native),
        })
    }
}

impl StagePort for RealSerialPort {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let port = self.reader.get_mut();
        port.write_all(line.as_bytes())?;
        port.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        loop {
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) if buf.is_empty() => return Ok(None),
                Ok(_) if buf.ends_with(b"\n") => break,
                // Partial line at end of stream
                Ok(0) => break,
                Ok(_) => continue,
                // No deadline on stage replies: keep waiting through poll timeouts
                Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
