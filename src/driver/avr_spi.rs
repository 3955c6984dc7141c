//! AVR in-system SPI programming: signature probe, page read/load/write,
//! chip erase.

use std::collections::HashMap;

use crate::backend::Backend;
use crate::bits::cmd;
use crate::error::{Error, Result};
use crate::mem::{split_to_pages, Mem};

use super::Context;

pub const RESET: &str = "RESET";
pub const SCK: &str = "SCK";
pub const MISO: &str = "MISO";
pub const MOSI: &str = "MOSI";

const TWD_FLASH: f64 = 4.5e-3;
const TWD_ERASE: f64 = 9e-3;

const PROGRAMMING_ENABLED: u32 = 0x53;

const SPI_PROGRAMMING_ENABLE: &str = "1010 1100 0101 0011 ____ ____ ____ ____";
const SPI_CHIP_ERASE: &str = "1010 1100 1000 0000 xxxx xxxx xxxx xxxx";
const SPI_READ_PROGRAM_MEMORY: &str = "0010 h000 aaaa aaaa aaaa aaaa 0000 0000";
const SPI_LOAD_PROGRAM_MEMORY_PAGE: &str = "0100 h000 00__ ____ __aa aaaa iiii iiii";
const SPI_WRITE_PROGRAM_MEMORY_PAGE: &str = "0100 1100 00aa aaaa aaaa aaaa ____ ____";
const SPI_READ_SIGNATURE_BYTE: &str = "0011 0000 0000 0000 0000 00aa 0000 0000";

/// A detected AVR part's programming geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    pub name: &'static str,
    pub flash_size: u32,
    pub page_size: u32,
    pub eeprom_size: u32,
}

fn device_signatures() -> HashMap<(u8, u8, u8), Device> {
    [
        (
            (0x1e, 0x91, 0x0a),
            Device {
                name: "attiny2313",
                flash_size: 1 << 11,
                page_size: 32,
                eeprom_size: 128,
            },
        ),
        (
            (0x1e, 0x94, 0x03),
            Device {
                name: "atmega16a",
                flash_size: 1 << 14,
                page_size: 128,
                eeprom_size: 512,
            },
        ),
        (
            (0x1e, 0x95, 0x02),
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

/// Resets the target into SPI programming mode, enables programming, and
/// probes its signature bytes against the known-device table.
pub fn open<B: Backend>(ctx: &mut Context<'_, B>) -> Result<Device> {
    let p = &mut *ctx.pinproxy;
    p.set_as_input(&[MISO])?;
    for pin in [RESET, SCK, MOSI] {
        p.set_as_output(&[pin])?;
        p.reset_pin(pin)?;
    }
    p.set(RESET)?;
    p.wait(0.01)?;
    p.reset_pin(RESET)?;
    p.wait(0.025)?;

    spi(p, &cmd(SPI_PROGRAMMING_ENABLE, &[])?, &read_range(16, 24))?;
    let is_sync = p.pop_fetched(MISO, 8, Some(1), false)?[0];
    if is_sync != PROGRAMMING_ENABLED {
        return Err(Error::OutOfSync(is_sync as u8));
    }
    log::info!("programming enabled");

    for i in 0..3 {
        let spi_command = cmd(SPI_READ_SIGNATURE_BYTE, &[('a', i)])?;
        spi(p, &spi_command, &read_range(24, 32))?;
    }
    let sigbytes = p.pop_fetched(MISO, 8, Some(3), false)?;
    let key = (sigbytes[0] as u8, sigbytes[1] as u8, sigbytes[2] as u8);
    let device = *device_signatures()
        .get(&key)
        .ok_or_else(|| Error::UnknownDevice(vec![key.0, key.1, key.2]))?;
    log::info!("detected: {}", device.name);
    Ok(device)
}

fn read_range(lo: u32, hi: u32) -> Vec<usize> {
    (lo as usize..hi as usize).collect()
}

fn spi<B: Backend>(
    p: &mut crate::pinproxy::PinProxy<B>,
    command: &[u8],
    read_positions: &[usize],
) -> Result<()> {
    assert_eq!(command.len(), 32);
    for (i, &bit) in command.iter().enumerate() {
        p.wait(500e-9)?;
        p.set_pin(MOSI, bit != 0)?;
        p.wait(500e-9)?;
        p.set_pin(SCK, true)?;
        p.wait(500e-9)?;
        if read_positions.contains(&i) {
            p.fetch_pin(MISO)?;
        }
        p.wait(500e-9)?;
        p.set_pin(SCK, false)?;
    }
    Ok(())
}

/// Reads the whole flash array byte-by-byte.
pub fn read_flash<B: Backend>(ctx: &mut Context<'_, B>) -> Result<Mem> {
    let device = open(ctx)?;
    let p = &mut *ctx.pinproxy;
    for address in 0..device.flash_size {
        ctx.progress.update(address as f64, device.flash_size as f64);
        let spi_command = cmd(
            SPI_READ_PROGRAM_MEMORY,
            &[('h', address & 1), ('a', address >> 1)],
        )?;
        spi(p, &spi_command, &read_range(24, 32))?;
    }
    let bytes = p.pop_fetched(MISO, 8, None, false)?;
    Ok(bytes
        .into_iter()
        .enumerate()
        .map(|(a, v)| (a as u32, v as u8))
        .collect())
}

/// Loads each page into the device's page buffer, then commits it with a
/// page-write command and a `TWD_FLASH` settle delay. Addresses absent
/// from `mem` within a partial last page are left unprogrammed: only the
/// bytes actually present get loaded before the page-write fires.
pub fn write_flash<B: Backend>(ctx: &mut Context<'_, B>, mem: &Mem) -> Result<()> {
    let device = open(ctx)?;

    let max_addr = *mem.keys().max().unwrap_or(&0);
    let mem = if !mem.is_empty() && max_addr >= device.flash_size {
        log::warn!(
            "device flash size ({}) < input data max address ({})",
            device.flash_size,
            max_addr
        );
        mem.iter()
            .filter(|&(&a, _)| a < device.flash_size)
            .map(|(&a, &v)| (a, v))
            .collect()
    } else {
        mem.clone()
    };

    let page_size = device.page_size;
    let p = &mut *ctx.pinproxy;
    for page in split_to_pages(&mem, page_size) {
        let mut last_byte_address = 0;
        for (&byte_address, &value) in page.iter() {
            last_byte_address = byte_address;
            let offset = byte_address % page_size;
            let spi_command = cmd(
                SPI_LOAD_PROGRAM_MEMORY_PAGE,
                &[('h', offset & 1), ('a', offset >> 1), ('i', value as u32)],
            )?;
            spi(p, &spi_command, &[])?;
            ctx.progress.update(byte_address as f64, device.flash_size as f64);
        }
        let wpage = last_byte_address / page_size * page_size / 2;
        spi(p, &cmd(SPI_WRITE_PROGRAM_MEMORY_PAGE, &[('a', wpage)])?, &[])?;
        p.wait(TWD_FLASH)?;
    }
    Ok(())
}

/// Erases the whole chip.
pub fn chip_erase<B: Backend>(ctx: &mut Context<'_, B>) -> Result<()> {
    open(ctx)?;
    spi(&mut *ctx.pinproxy, &cmd(SPI_CHIP_ERASE, &[])?, &[])?;
    ctx.progress.update(1.0, 2.0);
    ctx.pinproxy.wait(TWD_ERASE)
}
