//! AVR JTAG in-system programming: TAP state-machine primitives plus the
//! PROG_ENABLE/PROG_COMMANDS/PROG_PAGELOAD/PROG_PAGEREAD instruction
//! sequences.

use std::collections::HashMap;

use crate::backend::Backend;
use crate::bits::{cmd, reverse};
use crate::error::{Error, Result};
use crate::mem::Mem;
use crate::pinproxy::PinProxy;

use super::Context;

pub const RESET: &str = "RESET";
pub const TCK: &str = "TCK";
pub const TMS: &str = "TMS";
pub const TDI: &str = "TDI";
pub const TDO: &str = "TDO";

const IDCODE: u32 = 1;
const AVR_RESET: u32 = 0xc;
const PROG_ENABLE: u32 = 4;
const PROG_COMMANDS: u32 = 5;
const PROG_PAGELOAD: u32 = 6;
const PROG_PAGEREAD: u32 = 7;

/// A detected AVR part's programming geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    pub name: &'static str,
    pub flash_size: u32,
    pub page_size: u32,
    pub eeprom_size: u32,
}

fn device_signatures() -> HashMap<(u32, u32, u8, u8, u8), Device> {
    [
        (
            (0x1f, 0x9403, 0x1e, 0x94, 3),
            Device {
                name: "atmega16a",
                flash_size: 1 << 14,
                page_size: 128,
                eeprom_size: 512,
            },
        ),
        (
            (0x1f, 0x9502, 0x1e, 0x95, 2),
            Device {
                name: "atmega32a",
                flash_size: 1 << 15,
                page_size: 128,
                eeprom_size: 1024,
            },
        ),
    ]
    .iter()
    .cloned()
    .collect()
}

// ---- TAP controller primitives ----

fn change_state<B: Backend>(p: &mut PinProxy<B>, tms_seq: &[u8]) -> Result<()> {
    for &b in tms_seq {
        p.set_pin(TMS, b != 0)?;
        p.set(TCK)?;
        p.reset_pin(TCK)?;
    }
    Ok(())
}

/// Shifts `tdi_seq` through whichever register is currently selected,
/// fetching TDO on cycle indices listed in `read_bits`. TDI bits are
/// transmitted as a trailing dummy zero followed by `tdi_seq` in reverse,
/// a consequence of the register's one-cycle sample pipeline that the
/// reference implementation encodes as a stack pop rather than an index.
fn shift_register<B: Backend>(
    p: &mut PinProxy<B>,
    tdi_seq: &[u8],
    read_bits: &[usize],
) -> Result<()> {
    let n = tdi_seq.len();
    let mut stack = tdi_seq.to_vec();
    stack.push(0);
    let mut tms_seq = vec![0u8; n];
    tms_seq.push(1);

    for (i, &tms) in tms_seq.iter().enumerate() {
        let tdi = stack.pop().unwrap();
        p.set_pin(TDI, tdi != 0)?;
        p.set_pin(TMS, tms != 0)?;
        p.set(TCK)?;
        p.reset_pin(TCK)?;
        if read_bits.contains(&i) {
            p.fetch_pin(TDO)?;
        }
    }
    Ok(())
}

fn shift_ir<B: Backend>(p: &mut PinProxy<B>, tdi_seq: &[u8], read_bits: &[usize]) -> Result<()> {
    change_state(p, &[1, 1, 0])?; // Capture-IR
    shift_register(p, tdi_seq, read_bits)?; // Exit1-IR
    change_state(p, &[1, 0]) // Idle
}

fn shift_dr<B: Backend>(p: &mut PinProxy<B>, tdi_seq: &[u8], read_bits: &[usize]) -> Result<()> {
    change_state(p, &[1, 0])?; // Capture-DR
    shift_register(p, tdi_seq, read_bits)?;
    change_state(p, &[1, 0]) // Idle
}

fn reset_to_idle<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    change_state(p, &[1, 1, 1, 1, 1, 0])
}

// ---- AVR programming instructions ----

fn avr_reset<B: Backend>(p: &mut PinProxy<B>, on: bool) -> Result<()> {
    shift_ir(p, &cmd("cccc", &[('c', AVR_RESET)])?, &[])?;
    shift_dr(p, &[on as u8], &[])
}

fn prog_enable<B: Backend>(p: &mut PinProxy<B>, enable: bool) -> Result<()> {
    shift_ir(p, &cmd("cccc", &[('c', PROG_ENABLE)])?, &[])?;
    if enable {
        shift_dr(
            p,
            &[1, 0, 1, 0, 0, 0, 1, 1, 0, 1, 1, 1, 0, 0, 0, 0],
            &[],
        )
    } else {
        shift_dr(p, &[0u8; 16], &[])
    }
}

fn prog_commands<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    shift_ir(p, &cmd("cccc", &[('c', PROG_COMMANDS)])?, &[])
}

fn prog_pageread<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    shift_ir(p, &cmd("cccc", &[('c', PROG_PAGEREAD)])?, &[])
}

fn prog_pageload<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    shift_ir(p, &cmd("cccc", &[('c', PROG_PAGELOAD)])?, &[])
}

fn get_idcode<B: Backend>(p: &mut PinProxy<B>) -> Result<(u32, u32, u32)> {
    shift_ir(p, &cmd("cccc", &[('c', IDCODE)])?, &[])?;
    let read_bits: Vec<usize> = (0..32).collect();
    shift_dr(p, &[0u8; 32], &read_bits)?;

    let idcode = p.pop_fetched(TDO, 32, Some(1), true)?[0];
    let version = idcode >> 28;
    let partno = (idcode >> 12) & 0xffff;
    let manufacturer_id = (idcode >> 1) & 0x7ff;
    Ok((manufacturer_id, partno, version))
}

fn write_flash_page<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    shift_dr(p, &[0, 1, 1, 0, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0], &[])?;
    shift_dr(p, &[0, 1, 1, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0], &[])?;
    shift_dr(p, &[0, 1, 1, 0, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0], &[])?;
    shift_dr(p, &[0, 1, 1, 0, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0], &[])?;
    p.wait(0.0045)
}

fn erase_sequence<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    shift_dr(p, &[0, 1, 0, 0, 0, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0], &[])?;
    shift_dr(p, &[0, 1, 1, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0], &[])?;
    shift_dr(p, &[0, 1, 1, 0, 0, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0], &[])?;
    shift_dr(p, &[0, 1, 1, 0, 0, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0], &[])?;
    p.wait(0.009)
}

fn enter_flash_write<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    shift_dr(p, &[0, 1, 0, 0, 0, 1, 1, 0, 0, 0, 1, 0, 0, 0, 0], &[])
}

fn enter_flash_read<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    shift_dr(p, &[0, 1, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 1, 0], &[])
}

fn load_address<B: Backend>(p: &mut PinProxy<B>, address: u32) -> Result<()> {
    let ab = cmd("aaaaaaaaaaaaaaaa", &[('a', address)])?;
    let mut high = vec![0, 0, 0, 0, 1, 1, 1];
    high.extend_from_slice(&ab[0..8]);
    shift_dr(p, &high, &[])?;
    let mut low = vec![0, 0, 0, 0, 0, 1, 1];
    low.extend_from_slice(&ab[8..16]);
    shift_dr(p, &low, &[])
}

fn read_signature_bytes<B: Backend>(p: &mut PinProxy<B>) -> Result<Vec<u32>> {
    let read8: Vec<usize> = (0..8).collect();
    shift_dr(p, &[0, 1, 0, 0, 0, 1, 1, 0, 0, 0, 0, 1, 0, 0, 0], &[])?;

    shift_dr(p, &[0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0], &[])?;
    shift_dr(p, &[0, 1, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0], &[])?;
    shift_dr(p, &[0, 1, 1, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0], &read8)?;

    shift_dr(p, &[0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0, 1], &[])?;
    shift_dr(p, &[0, 1, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0], &[])?;
    shift_dr(p, &[0, 1, 1, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0], &read8)?;

    shift_dr(p, &[0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 1, 0], &[])?;
    shift_dr(p, &[0, 1, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0], &[])?;
    shift_dr(p, &[0, 1, 1, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0], &read8)?;

    p.pop_fetched(TDO, 8, Some(3), true)
}

fn read_page<B: Backend>(p: &mut PinProxy<B>) -> Result<()> {
    let read_bits: Vec<usize> = (8..1032).collect();
    shift_dr(p, &[0u8; 1032], &read_bits)
}

fn write_page<B: Backend>(p: &mut PinProxy<B>, tdi_seq: &[u8]) -> Result<()> {
    shift_dr(p, tdi_seq, &[])
}

/// Resets the target, walks the TAP to idle, and probes the IDCODE plus
/// the programming-mode signature bytes against the known-device table.
pub fn open<B: Backend>(ctx: &mut Context<'_, B>) -> Result<Device> {
    let p = &mut *ctx.pinproxy;
    p.set_as_input(&[TDO])?;
    for pin in [RESET, TMS, TCK, TDI] {
        p.set_as_output(&[pin])?;
        p.reset_pin(pin)?;
    }
    p.set(RESET)?;
    p.wait(0.01)?;
    p.reset_pin(RESET)?;
    p.wait(0.025)?;

    reset_to_idle(p)?;

    let (mid, pno, version) = get_idcode(p)?;
    avr_reset(p, true)?;
    prog_enable(p, true)?;
    prog_commands(p)?;
    let sig = read_signature_bytes(p)?;
    let key = (mid, pno, sig[0] as u8, sig[1] as u8, sig[2] as u8);
    let device = *device_signatures()
        .get(&key)
        .ok_or_else(|| Error::UnknownDevice(vec![sig[0] as u8, sig[1] as u8, sig[2] as u8]))?;
    log::info!("detected: {} (jtag version {})", device.name, version);
    Ok(device)
}

/// Reads the flash array one half-page of words at a time.
pub fn read_flash<B: Backend>(ctx: &mut Context<'_, B>) -> Result<Mem> {
    let device = open(ctx)?;
    let p = &mut *ctx.pinproxy;
    enter_flash_read(p)?;

    let word_size = device.flash_size / 2;
    let word_step = device.page_size / 2;
    let mut address = 0;
    while address < word_size {
        prog_commands(p)?;
        load_address(p, address)?;
        prog_pageread(p)?;
        read_page(p)?;
        ctx.progress.update(address as f64, word_size as f64);
        address += word_step;
    }

    let p = &mut *ctx.pinproxy;
    prog_commands(p)?;
    prog_enable(p, false)?;
    avr_reset(p, false)?;

    let bytes = p.pop_fetched(TDO, 8, None, true)?;
    Ok(bytes
        .into_iter()
        .enumerate()
        .map(|(a, v)| (a as u32, v as u8))
        .collect())
}

/// Programs the flash array a page at a time.
pub fn write_flash<B: Backend>(ctx: &mut Context<'_, B>, mem: &Mem) -> Result<()> {
    let device = open(ctx)?;
    let p = &mut *ctx.pinproxy;
    enter_flash_write(p)?;

    let mut address = 0;
    while address < device.flash_size {
        let mut bits: Vec<u8> = Vec::new();
        for i in address..address + device.page_size {
            let v = *mem.get(&i).unwrap_or(&0xff);
            let rv = reverse(v as u32, 8);
            bits.extend(cmd("dddddddd", &[('d', rv)])?);
        }
        bits.reverse();

        load_address(p, address / 2)?;
        prog_pageload(p)?;
        write_page(p, &bits)?;
        prog_commands(p)?;
        write_flash_page(p)?;
        ctx.progress.update(address as f64, device.flash_size as f64);
        address += device.page_size;
    }

    prog_commands(p)?;
    prog_enable(p, false)?;
    avr_reset(p, false)
}

/// Erases the whole chip.
pub fn chip_erase<B: Backend>(ctx: &mut Context<'_, B>) -> Result<()> {
    open(ctx)?;
    erase_sequence(&mut *ctx.pinproxy)
}
