//! Target-protocol drivers. Each submodule exposes plain `read`/`write`/
//! `erase` functions over a [`Context`] instead of a shared trait object,
//! since the set of operations a device supports differs per driver and a
//! uniform `Driver` trait would have to fake the missing ones.

pub mod avr_jtag;
pub mod avr_spi;
pub mod ee25lc040;
pub mod ee93lcx6;

use crate::backend::Backend;
use crate::pinproxy::PinProxy;
use crate::progress::ProgressSink;

/// Bundles the pin-proxy and a progress sink a driver operation needs,
/// replacing the source's reflective argument-binding decorator with an
/// explicit record.
pub struct Context<'a, B: Backend> {
    pub pinproxy: &'a mut PinProxy<B>,
    pub progress: &'a mut dyn ProgressSink,
}

impl<'a, B: Backend> Context<'a, B> {
    pub fn new(pinproxy: &'a mut PinProxy<B>, progress: &'a mut dyn ProgressSink) -> Self {
        Context { pinproxy, progress }
    }
}
