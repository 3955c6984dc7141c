//! Maps a driver name string onto the right plain `read`/`write`/`erase`
//! call, the small registry keyed by name that stands in for the
//! polymorphic dispatch a `Driver` trait would otherwise need.

use pinflash::backend::Backend;
use pinflash::driver::{avr_jtag, avr_spi, ee25lc040, ee93lcx6, Context};
use pinflash::mem::Mem;

use crate::error::{CliError, Result};

pub fn read<B: Backend>(driver: &str, ctx: &mut Context<'_, B>, model: u32) -> Result<Mem> {
    match driver {
        "avr-spi" => Ok(avr_spi::read_flash(ctx)?),
        "avr-jtag" => Ok(avr_jtag::read_flash(ctx)?),
        "ee25lc040" => Ok(ee25lc040::read(ctx)?),
        "ee93lcx6" => Ok(ee93lcx6::read(ctx, model)?),
        other => Err(CliError::UnknownDriver(other.to_string())),
    }
}

pub fn write<B: Backend>(driver: &str, ctx: &mut Context<'_, B>, model: u32, mem: &Mem) -> Result<()> {
    match driver {
        "avr-spi" => Ok(avr_spi::write_flash(ctx, mem)?),
        "avr-jtag" => Ok(avr_jtag::write_flash(ctx, mem)?),
        "ee25lc040" => Ok(ee25lc040::write(ctx, mem)?),
        "ee93lcx6" => Ok(ee93lcx6::write(ctx, model, mem)?),
        other => Err(CliError::UnknownDriver(other.to_string())),
    }
}

pub fn erase<B: Backend>(driver: &str, ctx: &mut Context<'_, B>, model: u32) -> Result<()> {
    match driver {
        "avr-spi" => Ok(avr_spi::chip_erase(ctx)?),
        "avr-jtag" => Ok(avr_jtag::chip_erase(ctx)?),
        "ee25lc040" => Ok(ee25lc040::erase(ctx)?),
        "ee93lcx6" => Ok(ee93lcx6::erase(ctx, model)?),
        other => Err(CliError::UnknownDriver(other.to_string())),
    }
}
