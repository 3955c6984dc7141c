use std::path::PathBuf;
use structopt::StructOpt;

/// Bindings shared by every subcommand: which driver and backend to talk
/// to, and the symbolic pin map wiring the driver onto the backend.
#[derive(StructOpt, Debug)]
pub struct Common {
    /// Target driver: avr-spi, avr-jtag, ee25lc040, or ee93lcx6.
    #[structopt(long)]
    pub driver: String,

    /// Backend transport: dummy, local, serial, or remote.
    #[structopt(long, default_value = "dummy")]
    pub backend: String,

    /// Symbolic-pin binding, `NAME=VALUE` ("_" for ignored). May be given
    /// more than once.
    #[structopt(name = "PIN", short = "p", long = "pin")]
    pub pin: Vec<String>,

    /// 93LC*6 model number (46, 56, or 66). Ignored by other drivers.
    #[structopt(long, default_value = "56")]
    pub model: u32,

    /// TTY path, required when `--backend serial`.
    #[structopt(long)]
    pub serial_path: Option<String>,

    /// Serial baud rate.
    #[structopt(long, default_value = "115200")]
    pub serial_baud: u32,

    /// Host of the `pinflash-gpiod` server, required when `--backend remote`.
    #[structopt(long)]
    pub remote_host: Option<String>,

    /// Port of the `pinflash-gpiod` server.
    #[structopt(long, default_value = "30456")]
    pub remote_port: u16,
}

#[derive(StructOpt, Debug)]
#[structopt(name = "pinflash")]
pub enum Command {
    /// Reads the whole device and writes it out in a hex file format.
    Read {
        #[structopt(flatten)]
        common: Common,

        /// Output file format: hexdump or ihex32.
        #[structopt(long, default_value = "hexdump")]
        format: String,

        #[structopt(name = "PATH")]
        path: PathBuf,
    },
    /// Programs the device from a hex file.
    Write {
        #[structopt(flatten)]
        common: Common,

        /// Input file format: hexdump or ihex32.
        #[structopt(long, default_value = "hexdump")]
        format: String,

        #[structopt(name = "PATH")]
        path: PathBuf,
    },
    /// Bulk-erases the device.
    Erase {
        #[structopt(flatten)]
        common: Common,
    },
}
