//! Front-end errors: usage mistakes that never reach the library (an
//! unrecognized driver/backend/format name), plus a transparent wrapper
//! around every [`pinflash::Error`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unknown driver {0:?} (expected avr-spi, avr-jtag, ee25lc040, or ee93lcx6)")]
    UnknownDriver(String),

    #[error("unknown backend {0:?} (expected dummy, local, serial, or remote)")]
    UnknownBackend(String),

    #[error("unknown file format {0:?} (expected hexdump or ihex32)")]
    UnknownFormat(String),

    #[error(transparent)]
    Core(#[from] pinflash::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
