//! The digital-I/O contract every target driver ultimately talks to
//! through the pin-proxy, and the concrete backends that implement it.

mod dummy;
pub use dummy::Dummy;

#[cfg(target_os = "linux")]
mod local_gpio;
#[cfg(target_os = "linux")]
pub use local_gpio::LocalGpio;

mod serial;
pub use serial::Serial;

mod remote_tcp;
pub use remote_tcp::RemoteTcp;

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::Result;

/// Callback invoked with a sampled input bit (0 or 1) once a `fetch_pin`
/// reply is available. Never invoked from another thread; always invoked
/// synchronously during `fetch_pin`, `flush`, or an internal drain.
pub type FetchCallback = Box<dyn FnMut(u8)>;

/// The minimal digital-I/O contract a transport (local GPIO, a serial
/// MCU co-processor, or a remote TCP executor) must implement.
///
/// All operations are non-blocking from the caller's point of view except
/// `flush`, which is a total ordering barrier: on return, every prior
/// output has taken effect and every prior `fetch_pin` callback has fired.
pub trait Backend {
    /// Backend-native pin identifier (an integer GPIO number for most
    /// transports, a short symbolic name for others).
    type Pin: Copy + Eq + Hash + Debug;

    /// Pins the backend can drive as outputs.
    fn output_pins(&self) -> HashSet<Self::Pin>;
    /// Pins the backend can sample as inputs.
    fn input_pins(&self) -> HashSet<Self::Pin>;

    /// Acquires the underlying transport. Must be safe to call again after
    /// `close`.
    fn open(&mut self) -> Result<()>;
    /// Releases the underlying transport. Must be idempotent.
    fn close(&mut self) -> Result<()>;

    fn set_as_input(&mut self, pin: Self::Pin) -> Result<()>;
    fn set_as_output(&mut self, pin: Self::Pin) -> Result<()>;

    /// Drives `pin` to logic `state`.
    fn set_pin(&mut self, pin: Self::Pin, state: bool) -> Result<()>;

    /// Asynchronously samples `pin`; `callback` fires once the sample is
    /// available, in the same order this method was called relative to
    /// other `fetch_pin` calls.
    fn fetch_pin(&mut self, pin: Self::Pin, callback: FetchCallback) -> Result<()>;

    /// Inserts a delay of at least `seconds` into the logical timeline.
    /// Fails with `Error::NegativeWait` if `seconds` is negative.
    fn wait(&mut self, seconds: f64) -> Result<()>;

    /// Blocks until all previously issued outputs have taken effect and all
    /// previously issued `fetch_pin` callbacks have fired.
    fn flush(&mut self) -> Result<()>;
}
