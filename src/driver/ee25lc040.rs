//! 25LC040 bit-banged SPI EEPROM: a 512-byte part addressed by a 9-bit
//! address split across the opcode byte's low bit and a full address byte.

use crate::backend::Backend;
use crate::bits::cmd;
use crate::error::{Error, Result};
use crate::mem::Mem;
use crate::pinproxy::PinProxy;

use super::Context;

pub const CS: &str = "CS";
pub const SCK: &str = "SCK";
pub const SI: &str = "SI";
pub const SO: &str = "SO";
pub const HOLD: &str = "HOLD";
pub const WP: &str = "WP";

const SIZE: u32 = 512;
const CHUNK: u32 = 64;

const TCSS: f64 = 500e-9;
const TCSD: f64 = 500e-9;
const TSU: f64 = 50e-9;
const THD: f64 = 100e-9;
const THI: f64 = 475e-9;
const TLO: f64 = 475e-9;
const TWC: f64 = 5e-3;

const READ: &str = "0000a011 aaaaaaaa";
const WRITE: &str = "0000a010 aaaaaaaa";
const DATA_BYTE: &str = "dddddddd";
const WREN: &str = "00000110";
const RDSR: &str = "00000101xxxxxxxx";

fn open<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    p.set_as_input(&[SO])?;
    for pin in [CS, SCK, SI, HOLD, WP] {
        p.set_as_output(&[pin])?;
        p.reset_pin(pin)?;
    }
    p.set(HOLD)?;
    p.set(WP)
}

fn pump<B: Backend>(p: &mut PinProxy<B>, sequence: &[u8], read_after: Option<usize>) -> Result<()> {
    p.reset_pin(CS)?;
    p.wait(TCSS)?;

    for (i, &bit) in sequence.iter().enumerate() {
        p.set_pin(SI, bit != 0)?;
        p.wait(TSU)?;
        p.set(SCK)?;
        p.wait(THI)?;
        if let Some(n) = read_after {
            if i >= n {
                p.fetch_pin(SO)?;
            }
        }
        p.wait(THD)?;
        p.reset_pin(SCK)?;
        p.wait(TLO)?;
    }

    p.wait(TCSD)?;
    p.set(CS)
}

fn wren<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    pump(p, &cmd(WREN, &[])?, None)
}

/// Reads the 16-bit status register (bit 1 is WEL, write-enable-latch).
pub fn rdsr<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    pump(p, &cmd(RDSR, &[])?, Some(8))
}

fn write_page<B: Backend>(p: &mut PinProxy<B>, address: u32, data: &[u8]) -> Result<()> {
    assert!((1..=16).contains(&data.len()));
    let mut sequence = cmd(WRITE, &[('a', address)])?;
    for &byte in data {
        sequence.extend(cmd(DATA_BYTE, &[('d', byte as u32)])?);
    }
    pump(p, &sequence, None)?;
    p.wait(TWC)
}

/// Reads all 512 bytes in 64-byte chunks.
pub fn read<B: Backend>(ctx: &mut Context<'_, B>) -> Result<Mem> {
    let p = &mut *ctx.pinproxy;
    open(p)?;

    let mut addr = 0;
    while addr < SIZE {
        ctx.progress.update(addr as f64, SIZE as f64);
        let p = &mut *ctx.pinproxy;
        let mut sequence = cmd(READ, &[('a', addr)])?;
        sequence.extend(std::iter::repeat(0u8).take(8 * CHUNK as usize));
        pump(p, &sequence, Some(16))?;
        addr += CHUNK;
    }

    let bytes = ctx.pinproxy.pop_fetched(SO, 8, None, false)?;
    Ok(bytes
        .into_iter()
        .enumerate()
        .map(|(a, v)| (a as u32, v as u8))
        .collect())
}

/// Writes every 16-byte page, checking the write-enable-latch status bit
/// after each.
pub fn write<B: Backend>(ctx: &mut Context<'_, B>, mem: &Mem) -> Result<()> {
    {
        let p = &mut *ctx.pinproxy;
        open(p)?;
    }

    let mut page = 0;
    while page < SIZE {
        let data: Vec<u8> = (0..16)
            .map(|offset| *mem.get(&(page + offset)).unwrap_or(&0xff))
            .collect();
        ctx.progress.update(page as f64, SIZE as f64);

        let p = &mut *ctx.pinproxy;
        wren(p)?;
        rdsr(p)?;
        write_page(p, page, &data)?;
        page += 16;
    }

    let sr_stats = ctx.pinproxy.pop_fetched(SO, 8, None, false)?;
    if !sr_stats.iter().all(|sr| sr & 2 != 0) {
        return Err(Error::WriteFailed);
    }
    Ok(())
}

/// Blanks the whole part by writing `0xff` to every byte.
pub fn erase<B: Backend>(ctx: &mut Context<'_, B>) -> Result<()> {
    write(ctx, &Mem::new())
}
