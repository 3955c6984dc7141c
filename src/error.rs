//! Crate-wide error type.
//!
//! Variants are grouped into four categories: bad input data,
//! pin-map/direction misconfiguration, device protocol failures, and
//! transport failures. Drivers and the pin-proxy never retry silently;
//! every variant is meant to propagate straight to the caller.

use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // -- InvalidInput --
    #[error("invalid record on line {line}: {text}")]
    InvalidRecord { line: usize, text: String },

    #[error("checksum mismatch on line {line}: {text}")]
    ChecksumMismatch { line: usize, text: String },

    #[error("unknown placeholder '{0}' in bit template")]
    UnknownPlaceholder(char),

    #[error("invalid character '{0}' in bit template")]
    InvalidCharacter(char),

    #[error("operand '{0}' does not fit in its placeholder slots")]
    OutOfRange(char),

    #[error("wait duration must not be negative: {0}")]
    NegativeWait(f64),

    #[error("unknown EEPROM model: {0}")]
    UnknownEepromModel(u32),

    // -- ConfigurationError --
    #[error("backend does not offer pin '{0}'")]
    UnknownPin(String),

    #[error("pin '{0}' is unassigned")]
    UnassignedPin(String),

    #[error("pin '{0}' does not support direction {1:?}")]
    DirectionUnsupported(String, crate::pinproxy::Direction),

    #[error("pin '{0}' is not set as {1:?}")]
    DirectionMismatch(String, crate::pinproxy::Direction),

    // -- DeviceError --
    #[error("out of sync: expected 0x53 echo, got {0:#04x}")]
    OutOfSync(u8),

    #[error("unknown device signature: {0:02x?}")]
    UnknownDevice(Vec<u8>),

    #[error("write verification failed")]
    WriteFailed,

    // -- TransportError --
    #[error("transport error: {0}")]
    Transport(String),

    #[error("serial I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[cfg(target_os = "linux")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] sysfs_gpio::Error),
}
