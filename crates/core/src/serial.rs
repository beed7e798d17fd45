//! Hardware serial ports.
//!
//! [`SerialPorts`] opens real devices (`COM3`, `/dev/ttyUSB0`, ...) through
//! the `serialport` crate with the session's baud rate and parity, 8 data
//! bits and 1 stop bit. Port pairs are usually two ends of a null-modem
//! cable or a virtual pair created by a driver such as com0com or socat.

use crate::error::Result;
use crate::transport::{ByteChannel, LineSettings, Parity, PortOpener};
use serialport::{DataBits, FlowControl, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

/// Opener for the host's serial devices.
#[derive(Debug, Clone)]
pub struct SerialPorts {
    read_timeout: Duration,
}

impl SerialPorts {
    pub fn new() -> Self {
        Self {
            read_timeout: Duration::from_millis(20),
        }
    }

    /// How long a read waits before reporting "nothing yet".
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

impl Default for SerialPorts {
    fn default() -> Self {
        Self::new()
    }
}

impl PortOpener for SerialPorts {
    fn open(&self, name: &str, settings: &LineSettings) -> Result<Box<dyn ByteChannel>> {
        let port = serialport::new(name, settings.baud)
            .parity(settings.parity.into())
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.read_timeout)
            .open()
            .map_err(io::Error::from)?;

        log::debug!("opened {} at {} baud, parity {}", name, settings.baud, settings.parity);

        Ok(Box::new(SerialChannel {
            name: name.to_string(),
            port: Some(port),
        }))
    }

    /// Enumerated devices, or none if enumeration fails.
    fn port_names(&self) -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                log::warn!("serial port enumeration failed: {}", e);
                Vec::new()
            }
        }
    }
}

struct SerialChannel {
    name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialChannel {
    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port closed"))
    }
}

impl ByteChannel for SerialChannel {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            log::debug!("closed {}", self.name);
        }
        Ok(())
    }
}
