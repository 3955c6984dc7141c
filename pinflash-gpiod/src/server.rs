//! Direct translation of `rpi_tcpserver.py`'s `handle_client`/`serve_forever`:
//! single-threaded, one client at a time, the same opcode stream as
//! [`pinflash::backend::RemoteTcp`] on the other end.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use sysfs_gpio::{Direction, Pin as SysfsPin};

use pinflash::remote_proto::{
    Command, FLUSH_DONE, OP_FLUSH, OP_READPIN, OP_SETPIN_HIGH, OP_SETPIN_LOW, OP_SET_AS_INPUT,
    OP_SET_AS_OUTPUT, OP_WAIT_100NS, PROGRESS_CHUNKSIZE, PROGRESS_MARK,
};

use crate::error::Result;

/// Owns every GPIO line this server has exported for the current client,
/// exporting lines lazily on first use exactly as the local-GPIO backend
/// does.
pub struct GpioState {
    exported: HashMap<u8, SysfsPin>,
}

impl GpioState {
    pub fn new() -> Self {
        GpioState {
            exported: HashMap::new(),
        }
    }

    fn pin(&mut self, n: u8) -> Result<&SysfsPin> {
        if !self.exported.contains_key(&n) {
            let p = SysfsPin::new(n as u64);
            p.export()?;
            self.exported.insert(n, p);
        }
        Ok(self.exported.get(&n).unwrap())
    }

    fn set_direction(&mut self, n: u8, dir: Direction) -> Result<()> {
        self.pin(n)?.set_direction(dir)?;
        Ok(())
    }

    fn set_pin(&mut self, n: u8, state: bool) -> Result<()> {
        self.pin(n)?.set_value(state as u8)?;
        Ok(())
    }

    fn read_pin(&mut self, n: u8) -> Result<u8> {
        self.pin(n)?.get_value()
    }

    /// Resets every exported line back to an input and releases it,
    /// matching `GPIO.cleanup()` run after each client disconnects.
    fn cleanup(&mut self) {
        for (_, pin) in self.exported.drain() {
            let _ = pin.set_direction(Direction::In);
            let _ = pin.unexport();
        }
    }
}

impl Default for GpioState {
    fn default() -> Self {
        Self::new()
    }
}

/// Processes opcodes from one client connection until it disconnects.
///
/// The busy-spin wait loop ahead of every opcode is kept verbatim: clients
/// rely on `WAIT_100NS`'s exact latency, and swapping it for a sleep-based
/// wait would change the timing contract other backends are built against.
pub fn handle_client(stream: &mut TcpStream, gpio: &mut GpioState) -> Result<()> {
    let mut pending = Vec::new();
    let mut wakeup: Option<Instant> = None;
    let mut op_count: u32 = 0;
    let mut buf = [0u8; 1024];

    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        pending.extend_from_slice(&buf[..n]);

        let mut consumed = 0;
        while consumed + 1 < pending.len() {
            if let Some(deadline) = wakeup.take() {
                while Instant::now() < deadline {}
            }

            let op = pending[consumed];
            let arg = pending[consumed + 1];
            consumed += 2;

            match op {
                OP_SETPIN_LOW => gpio.set_pin(arg, false)?,
                OP_SETPIN_HIGH => gpio.set_pin(arg, true)?,
                OP_READPIN => {
                    let value = gpio.read_pin(arg)?;
                    stream.write_all(&[value])?;
                }
                OP_FLUSH => stream.write_all(&[FLUSH_DONE])?,
                OP_SET_AS_OUTPUT => gpio.set_direction(arg, Direction::Out)?,
                OP_SET_AS_INPUT => gpio.set_direction(arg, Direction::In)?,
                op if op & 0xE0 == OP_WAIT_100NS => {
                    let ns = Command::wait_100ns_delay_ns(op, arg);
                    wakeup = Some(Instant::now() + Duration::from_nanos(ns));
                }
                other => log::warn!("invalid opcode received: {:#04x}", other),
            }

            op_count += 1;
            if op_count % PROGRESS_CHUNKSIZE == 0 {
                stream.write_all(&[PROGRESS_MARK])?;
            }
        }
        pending.drain(..consumed);
    }
}

/// Binds `address` and serves clients one at a time, forever.
pub fn serve_forever(address: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((address, port))?;
    log::info!("waiting for client on {}:{}...", address, port);

    loop {
        let (mut stream, peer) = listener.accept()?;
        log::info!("accepted connection: {}", peer);

        let mut gpio = GpioState::new();
        match handle_client(&mut stream, &mut gpio) {
            Ok(()) => {}
            Err(e) => log::warn!("{}", e),
        }
        gpio.cleanup();
        log::info!("connection closed.");
    }
}
