//! A deterministic pseudo-random backend, useful for driver tests.

use std::collections::HashSet;

use super::{Backend, FetchCallback};
use crate::error::Result;

/// Small xorshift-style PRNG so the crate doesn't need an external `rand`
/// dependency just to hand back deterministic test bits.
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Lcg(seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    fn next_bit(&mut self) -> u8 {
        // Numerical Recipes LCG constants; only used for test fixtures.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((self.0 >> 33) & 1) as u8
    }
}

/// 40-pin dummy backend. All pins are simultaneously valid inputs and
/// outputs; `fetch_pin` resolves its callback immediately with a bit drawn
/// from a fixed-seed generator.
pub struct Dummy {
    rng: Lcg,
}

impl Dummy {
    pub fn new() -> Self {
        Dummy::with_seed(0)
    }

    pub fn with_seed(seed: u64) -> Self {
        Dummy { rng: Lcg::new(seed) }
    }
}

impl Default for Dummy {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for Dummy {
    type Pin = u32;

    fn output_pins(&self) -> HashSet<u32> {
        (0..40).collect()
    }

    fn input_pins(&self) -> HashSet<u32> {
        (0..40).collect()
    }

    fn open(&mut self) -> Result<()> {
        log::debug!("dummy: open");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        log::debug!("dummy: close");
        Ok(())
    }

    fn set_as_input(&mut self, pin: u32) -> Result<()> {
        log::debug!("dummy: set_as_input {}", pin);
        Ok(())
    }

    fn set_as_output(&mut self, pin: u32) -> Result<()> {
        log::debug!("dummy: set_as_output {}", pin);
        Ok(())
    }

    fn set_pin(&mut self, pin: u32, state: bool) -> Result<()> {
        log::debug!("dummy: set_pin {}={}", pin, state);
        Ok(())
    }

    fn fetch_pin(&mut self, pin: u32, mut callback: FetchCallback) -> Result<()> {
        let bit = self.rng.next_bit();
        log::debug!("dummy: fetch_pin {} -> {}", pin, bit);
        callback(bit);
        Ok(())
    }

    fn wait(&mut self, seconds: f64) -> Result<()> {
        if seconds < 0.0 {
            return Err(crate::error::Error::NegativeWait(seconds));
        }
        std::thread::sleep(std::time::Duration::from_secs_f64(seconds));
        log::debug!("dummy: wait {}s", seconds);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        log::debug!("dummy: flush");
        Ok(())
    }
}
