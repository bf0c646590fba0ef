//! OS serial port connector
//!
//! Opens the port once and clones the handle so the reader and writer
//! threads each own one half.

use super::{Connector, PortPair};
use crate::config::{LinkConfig, Parity};
use crate::error::{Result, SeatLinkError};
use serialport::{DataBits, SerialPortInfo, SerialPortType, StopBits};

/// Connector backed by the `serialport` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl SerialConnector {
    /// List the serial ports the OS reports
    pub fn available_ports() -> Vec<SerialPortInfo> {
        serialport::available_ports().unwrap_or_default()
    }
}

/// One-line description of a port for listings
pub fn describe_port(port: &SerialPortInfo) -> String {
    match &port.port_type {
        SerialPortType::UsbPort(usb) => format!(
            "{} (USB {:04X}:{:04X}{})",
            port.port_name,
            usb.vid,
            usb.pid,
            usb.product
                .as_ref()
                .map(|p| format!(" {}", p))
                .unwrap_or_default()
        ),
        SerialPortType::PciPort => format!("{} (PCI)", port.port_name),
        SerialPortType::BluetoothPort => format!("{} (Bluetooth)", port.port_name),
        SerialPortType::Unknown => port.port_name.clone(),
    }
}

fn data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

fn stop_bits(bits: u8) -> StopBits {
    match bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    }
}

fn parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    }
}

/// Map a `serialport` error onto the link error taxonomy
fn open_error(port: &str, e: serialport::Error) -> SeatLinkError {
    let missing = match &e.kind {
        serialport::ErrorKind::NoDevice => true,
        serialport::ErrorKind::Io(kind) => *kind == std::io::ErrorKind::NotFound,
        _ => false,
    };
    if missing {
        SeatLinkError::PortNotFound {
            port: port.to_string(),
        }
    } else {
        SeatLinkError::OpenFailed {
            port: port.to_string(),
            source: std::io::Error::other(e.to_string()),
        }
    }
}

impl Connector for SerialConnector {
    fn open(&self, settings: &LinkConfig) -> Result<PortPair> {
        let port_name = settings.port.as_str();
        if port_name.is_empty() {
            return Err(SeatLinkError::PortNotFound {
                port: String::new(),
            });
        }

        let reader = serialport::new(port_name, settings.baud_rate)
            .data_bits(data_bits(settings.data_bits))
            .stop_bits(stop_bits(settings.stop_bits))
            .parity(parity(settings.parity))
            .timeout(settings.read_timeout())
            .open()
            .map_err(|e| open_error(port_name, e))?;

        let mut writer = reader.try_clone().map_err(|e| open_error(port_name, e))?;
        writer
            .set_timeout(settings.write_timeout())
            .map_err(|e| open_error(port_name, e))?;

        Ok(PortPair {
            reader: Box::new(reader),
            writer: Box::new(writer),
        })
    }
}
