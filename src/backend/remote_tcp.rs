//! Remote-GPIO backend: the same logical opcodes as [`super::Serial`], but
//! tunneled as two-byte `(opcode, arg)` pairs to a `pinflash-gpiod` TCP
//! server.

use std::collections::{HashSet, VecDeque};
use std::io::{Read, Write};
use std::net::TcpStream;

use crate::error::{Error, Result};
use crate::remote_proto::{
    Command, MAX_WAIT_QUANTUM, OP_FLUSH, OP_READPIN, OP_SETPIN_HIGH, OP_SETPIN_LOW,
    OP_SET_AS_INPUT, OP_SET_AS_OUTPUT, PROGRESS_CHUNKSIZE, PROGRESS_MARK,
};

use super::{Backend, FetchCallback};

/// Header pins usable as GPIO, mirroring the local-GPIO backend's header.
const NON_GPIO: &[u32] = &[1, 2, 4, 6, 9, 14, 17, 20, 25, 27, 28, 30, 34, 39];

/// Maximum number of outstanding reply callbacks before a non-blocking
/// drain is forced, bounding memory use on a backend that never throttles
/// on the peer's actual buffer occupancy.
const MAX_PENDING_CALLBACKS: usize = 512;

enum ReadSlot {
    Fetch(FetchCallback),
    ProgressMark,
    FlushAck,
}

/// Remote-TCP backend.
pub struct RemoteTcp {
    address: (String, u16),
    stream: Option<TcpStream>,
    read_callbacks: VecDeque<ReadSlot>,
    unprocessed: u32,
    pin_state: std::collections::HashMap<u32, Option<bool>>,
}

impl RemoteTcp {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let pin_state = Self::header_pins().into_iter().map(|p| (p, None)).collect();
        RemoteTcp {
            address: (host.into(), port),
            stream: None,
            read_callbacks: VecDeque::new(),
            unprocessed: 0,
            pin_state,
        }
    }

    fn header_pins() -> HashSet<u32> {
        (1..=40).filter(|p| !NON_GPIO.contains(p)).collect()
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::Transport("remote GPIO socket not open".into()))
    }

    fn send(&mut self, op: u8, arg: u8) -> Result<()> {
        let cmd = Command::new(op, arg);
        self.stream_mut()?.write_all(&[cmd.op, cmd.arg])?;
        self.unprocessed += 1;
        if self.unprocessed % PROGRESS_CHUNKSIZE == 0 {
            self.read_callbacks.push_back(ReadSlot::ProgressMark);
        }
        if self.unprocessed >= PROGRESS_CHUNKSIZE * 8
            || self.read_callbacks.len() >= MAX_PENDING_CALLBACKS
        {
            self.handle_recv(false)?;
        }
        Ok(())
    }

    fn handle_recv(&mut self, block: bool) -> Result<()> {
        loop {
            if self.read_callbacks.is_empty() {
                return Ok(());
            }
            let mut buf = [0u8; 512];
            let n = self
                .stream_mut()?
                .read(&mut buf)
                .map_err(|e| Error::Transport(format!("connection lost: {}", e)))?;
            if n == 0 {
                return Err(Error::Transport("connection lost".into()));
            }
            for &b in &buf[..n] {
                match self.read_callbacks.pop_front() {
                    Some(ReadSlot::Fetch(mut cb)) => cb(b),
                    Some(ReadSlot::ProgressMark) => {
                        assert_eq!(b, PROGRESS_MARK, "lost sync with progress mark");
                        self.unprocessed -= PROGRESS_CHUNKSIZE;
                    }
                    Some(ReadSlot::FlushAck) => {
                        assert_eq!(b, crate::remote_proto::FLUSH_DONE);
                    }
                    None => {}
                }
            }
            if !block {
                return Ok(());
            }
        }
    }
}

impl Backend for RemoteTcp {
    type Pin = u32;

    fn output_pins(&self) -> HashSet<u32> {
        Self::header_pins()
    }

    fn input_pins(&self) -> HashSet<u32> {
        Self::header_pins()
    }

    fn open(&mut self) -> Result<()> {
        let stream = TcpStream::connect((self.address.0.as_str(), self.address.1))?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.stream.is_some() {
            self.flush()?;
            self.stream = None;
        }
        Ok(())
    }

    fn set_as_input(&mut self, pin: u32) -> Result<()> {
        self.send(OP_SET_AS_INPUT, pin as u8)?;
        self.pin_state.insert(pin, None);
        Ok(())
    }

    fn set_as_output(&mut self, pin: u32) -> Result<()> {
        self.send(OP_SET_AS_OUTPUT, pin as u8)?;
        self.pin_state.insert(pin, None);
        Ok(())
    }

    fn set_pin(&mut self, pin: u32, state: bool) -> Result<()> {
        if self.pin_state.get(&pin).copied().flatten() != Some(state) {
            let op = if state { OP_SETPIN_HIGH } else { OP_SETPIN_LOW };
            self.send(op, pin as u8)?;
            self.pin_state.insert(pin, Some(state));
        }
        Ok(())
    }

    fn fetch_pin(&mut self, pin: u32, callback: FetchCallback) -> Result<()> {
        self.read_callbacks.push_back(ReadSlot::Fetch(callback));
        self.send(OP_READPIN, pin as u8)
    }

    fn wait(&mut self, seconds: f64) -> Result<()> {
        if seconds < 0.0 {
            return Err(Error::NegativeWait(seconds));
        }
        let mut ns100 = (seconds * 1e7).ceil() as i64;
        while ns100 > 10 {
            let n = ns100.min(MAX_WAIT_QUANTUM as i64) as u32;
            ns100 -= n as i64;
            let cmd = Command::wait_100ns(n);
            self.send(cmd.op, cmd.arg)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.read_callbacks.push_back(ReadSlot::FlushAck);
        self.send(OP_FLUSH, 0)?;
        self.handle_recv(true)
    }
}
