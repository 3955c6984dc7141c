//! 93LC*6 MicroWire EEPROM: command width (and so the opcode's bit
//! position within it) depends on the model, since the smaller 93LC46
//! only needs a 7-bit address against 56/66's 8/9 bits.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::mem::Mem;
use crate::pinproxy::PinProxy;

use super::Context;

pub const CS: &str = "CS";
pub const CLK: &str = "CLK";
pub const DI: &str = "DI";
pub const DO: &str = "DO";
pub const ORG: &str = "ORG";

const TWC: f64 = 10e-3;
const TEC: f64 = 15e-3;

const TCKH: f64 = 250e-9;
const TCKL: f64 = 250e-9;
const TCSS: f64 = 50e-9;
const TCSH: f64 = 0.0;
const TCSL: f64 = 250e-9;
const TDIS: f64 = 100e-9;
const TPD: f64 = 400e-9;

fn model_size(model: u32) -> Result<u32> {
    match model {
        46 => Ok(128),
        56 => Ok(256),
        66 => Ok(512),
        _ => Err(Error::UnknownEepromModel(model)),
    }
}

fn adjust_46cmd(model: u32, command: u32) -> u32 {
    if model == 46 {
        command >> 2
    } else {
        command
    }
}

fn open<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    p.set_as_input(&[DO])?;
    for pin in [CS, CLK, DI, ORG] {
        p.set_as_output(&[pin])?;
        p.reset_pin(pin)?;
    }
    Ok(())
}

fn pump<B: Backend>(
    p: &mut PinProxy<B>,
    command: u32,
    wait_after_time: f64,
    need_to_read: bool,
) -> Result<()> {
    let mut cmdbitmask = 1u32 << (32 - command.leading_zeros() - 1);

    p.set(CS)?;
    p.wait(TCSS)?;

    while cmdbitmask != 0 {
        p.set_pin(DI, command & cmdbitmask != 0)?;
        cmdbitmask >>= 1;
        p.wait(TDIS)?;
        p.set(CLK)?;
        p.wait(TCKH)?;
        p.reset_pin(CLK)?;
        p.wait(TCKL)?;
    }

    if need_to_read {
        for _ in 0..8 {
            p.set(CLK)?;
            p.wait(TCKH.max(TPD))?;
            p.fetch_pin(DO)?;
            p.reset_pin(CLK)?;
            p.wait(TCKL)?;
        }
    }

    p.wait(TCSH)?;
    p.reset_pin(CS)?;
    p.wait(wait_after_time)
}

fn cmd_read<B: Backend>(p: &mut PinProxy<B>, model: u32, address: u32) -> Result<()> {
    let command = adjust_46cmd(model, 0b110000000000) + (address & 0x1ff);
    pump(p, command, TCSL, true)
}

fn ewen<B: Backend>(p: &mut PinProxy<B>, model: u32) -> Result<()> {
    let command = adjust_46cmd(model, 0b100110000000);
    pump(p, command, TCSL, false)
}

fn ewds<B: Backend>(p: &mut PinProxy<B>, model: u32) -> Result<()> {
    let command = adjust_46cmd(model, 0b100000000000);
    pump(p, command, TCSL, false)
}

fn cmd_write<B: Backend>(p: &mut PinProxy<B>, model: u32, address: u32, value: u8) -> Result<()> {
    let command = adjust_46cmd(model, 0xa0000) + (address << 8) + (value as u32 & 0xff);
    pump(p, command, TWC, false)
}

fn eral<B: Backend>(p: &mut PinProxy<B>, model: u32) -> Result<()> {
    let command = adjust_46cmd(model, 0b100100000000);
    pump(p, command, TEC, false)
}

/// Reads every word of the part, addressed 0..size.
pub fn read<B: Backend>(ctx: &mut Context<'_, B>, model: u32) -> Result<Mem> {
    let size = model_size(model)?;
    {
        let p = &mut *ctx.pinproxy;
        open(p)?;
    }

    for addr in 0..size {
        ctx.progress.update(addr as f64, size as f64);
        cmd_read(&mut *ctx.pinproxy, model, addr)?;
    }

    let bytes = ctx.pinproxy.pop_fetched(DO, 8, None, false)?;
    Ok(bytes
        .into_iter()
        .enumerate()
        .map(|(a, v)| (a as u32, v as u8))
        .collect())
}

/// Writes every present address in `mem`, silently dropping addresses at
/// or beyond the model's size.
pub fn write<B: Backend>(ctx: &mut Context<'_, B>, model: u32, mem: &Mem) -> Result<()> {
    let size = model_size(model)?;
    {
        let p = &mut *ctx.pinproxy;
        open(p)?;
    }
    ewen(&mut *ctx.pinproxy, model)?;

    if let Some(&max_addr) = mem.keys().max() {
        if max_addr >= size {
            log::warn!(
                "device flash size ({}) < input data max address ({})",
                size,
                max_addr
            );
        }
    }

    let length = mem.len();
    for (i, (&addr, &byte)) in mem.iter().enumerate() {
        ctx.progress.update(i as f64, length as f64);
        if addr < size {
            cmd_write(&mut *ctx.pinproxy, model, addr, byte)?;
        }
    }
    ewds(&mut *ctx.pinproxy, model)
}

/// Enables writing, erases all locations to `0xff`, then disables writing.
pub fn erase<B: Backend>(ctx: &mut Context<'_, B>, model: u32) -> Result<()> {
    model_size(model)?;
    {
        let p = &mut *ctx.pinproxy;
        open(p)?;
    }
    ctx.progress.update(0.0, 4.0);
    ewen(&mut *ctx.pinproxy, model)?;
    ctx.progress.update(1.0, 4.0);
    eral(&mut *ctx.pinproxy, model)?;
    ctx.progress.update(2.0, 4.0);
    ewds(&mut *ctx.pinproxy, model)?;
    ctx.progress.update(3.0, 4.0);
    Ok(())
}
