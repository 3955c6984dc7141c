//! Direct `sysfs_gpio`-backed local GPIO transport (Linux only), modeled
//! after a Raspberry-Pi-style 40-pin header.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use sysfs_gpio::{Direction, Pin as SysfsPin};

use super::{Backend, FetchCallback};
use crate::error::{Error, Result};

/// Header pins that carry power/ground/ID-EEPROM and are never usable as
/// GPIO, mirroring a standard 40-pin header.
const NON_GPIO: &[u32] = &[1, 2, 4, 6, 9, 14, 17, 20, 25, 27, 28, 30, 34, 39];

/// Below this duration a busy-spin gives tighter timing than `sleep`,
/// whose scheduler granularity can easily blow a 500ns SPI setup window.
const BUSY_SPIN_THRESHOLD: f64 = 1e-4;

/// Local GPIO backend talking directly to the kernel's `sysfs_gpio`
/// interface.
pub struct LocalGpio {
    exported: HashMap<u32, SysfsPin>,
}

impl LocalGpio {
    pub fn new() -> Self {
        LocalGpio {
            exported: HashMap::new(),
        }
    }

    fn header_pins() -> HashSet<u32> {
        (1..=40).filter(|p| !NON_GPIO.contains(p)).collect()
    }

    fn pin(&mut self, pin: u32) -> Result<&SysfsPin> {
        if !self.exported.contains_key(&pin) {
            let p = SysfsPin::new(pin as u64);
            p.export()?;
            self.exported.insert(pin, p);
        }
        Ok(self.exported.get(&pin).unwrap())
    }
}

impl Default for LocalGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for LocalGpio {
    type Pin = u32;

    fn output_pins(&self) -> HashSet<u32> {
        Self::header_pins()
    }

    fn input_pins(&self) -> HashSet<u32> {
        Self::header_pins()
    }

    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        for (_, pin) in self.exported.drain() {
            let _ = pin.unexport();
        }
        Ok(())
    }

    fn set_as_input(&mut self, pin: u32) -> Result<()> {
        self.pin(pin)?.set_direction(Direction::In)?;
        Ok(())
    }

    fn set_as_output(&mut self, pin: u32) -> Result<()> {
        self.pin(pin)?.set_direction(Direction::Out)?;
        Ok(())
    }

    fn set_pin(&mut self, pin: u32, state: bool) -> Result<()> {
        self.pin(pin)?.set_value(state as u8)?;
        Ok(())
    }

    fn fetch_pin(&mut self, pin: u32, mut callback: FetchCallback) -> Result<()> {
        let value = self.pin(pin)?.get_value()?;
        callback(value);
        Ok(())
    }

    fn wait(&mut self, seconds: f64) -> Result<()> {
        if seconds < 0.0 {
            return Err(Error::NegativeWait(seconds));
        }
        if seconds > BUSY_SPIN_THRESHOLD {
            std::thread::sleep(std::time::Duration::from_secs_f64(seconds));
        } else {
            let deadline = Instant::now() + std::time::Duration::from_secs_f64(seconds);
            while Instant::now() < deadline {}
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
