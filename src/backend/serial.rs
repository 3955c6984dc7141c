//! Serial-attached MCU co-processor backend: one opcode byte per pin
//! operation, with credit-based flow control against the peer's input
//! buffer.
//!
//! Wire format: opcode in the high 3
//! bits, pin index in the low 5 bits.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortSettings, StopBits};

use super::{Backend, FetchCallback};
use crate::error::{Error, Result};

/// A pending reply the peer owes us: either a sampled bit destined for a
/// driver's callback, or a synthetic progress mark the flow-control layer
/// consumes itself.
enum ReadSlot {
    Fetch(FetchCallback),
    ProgressMark,
}

const OP_SETPIN_LOW: u8 = 0x00;
const OP_SETPIN_HIGH: u8 = 0x20;
const OP_WAIT_US: u8 = 0x40;
const OP_READ: u8 = 0x60;
const OP_SET_AS_OUTPUT: u8 = 0x80;
const OP_SET_AS_INPUT: u8 = 0xA0;

const LOOP_TIME_US: u32 = 15;
const CHUNKSIZE: u32 = 32;
const PROGRESS_MARK: u8 = 0x11;

/// Default pin-index table for a D1-mini-class co-processor; callers may
/// substitute their own via [`Serial::with_pin_table`].
pub fn default_pin_table() -> HashMap<&'static str, u8> {
    [
        ("D0", 16),
        ("D1", 5),
        ("D2", 4),
        ("D3", 0),
        ("D5", 14),
        ("D6", 12),
        ("D7", 13),
        ("D8", 15),
    ]
    .iter()
    .cloned()
    .collect()
}

/// Serial backend talking to a small MCU that executes one opcode per
/// byte and emits a [`PROGRESS_MARK`] after every [`CHUNKSIZE`] opcodes.
pub struct Serial {
    device: String,
    baud: u32,
    port: Option<Box<dyn SerialPort>>,
    pins: HashMap<&'static str, u8>,
    read_callbacks: VecDeque<ReadSlot>,
    unprocessed: u32,
    pin_state: HashMap<&'static str, Option<bool>>,
}

impl Serial {
    pub fn new(device: impl Into<String>, baud: u32) -> Self {
        Serial::with_pin_table(device, baud, default_pin_table())
    }

    pub fn with_pin_table(
        device: impl Into<String>,
        baud: u32,
        pins: HashMap<&'static str, u8>,
    ) -> Self {
        let pin_state = pins.keys().map(|&k| (k, None)).collect();
        Serial {
            device: device.into(),
            baud,
            port: None,
            pins,
            read_callbacks: VecDeque::new(),
            unprocessed: 0,
            pin_state,
        }
    }

    fn index(&self, pin: &'static str) -> Result<u8> {
        self.pins
            .get(pin)
            .copied()
            .ok_or_else(|| Error::UnknownPin(pin.to_string()))
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| Error::Transport("serial port not open".into()))
    }

    fn reset_mcu(&mut self) -> Result<()> {
        let port = self.port_mut()?;
        port.write_data_terminal_ready(false)?;
        port.write_request_to_send(false)?;
        port.write_data_terminal_ready(true)?;
        port.write_request_to_send(true)?;
        std::thread::sleep(Duration::from_millis(300));
        port.clear(serialport::ClearBuffer::Input)?;
        log::debug!("serial: MCU reset done");
        Ok(())
    }

    fn send(&mut self, op: u8) -> Result<()> {
        self.port_mut()?.write_all(&[op])?;
        self.unprocessed += 1;
        if self.unprocessed % CHUNKSIZE == 0 {
            self.read_callbacks.push_back(ReadSlot::ProgressMark);
        }
        while self.unprocessed >= CHUNKSIZE * 8 {
            self.handle_read(Some(1))?;
        }
        Ok(())
    }

    fn handle_read(&mut self, n: Option<usize>) -> Result<()> {
        let n = n.unwrap_or(self.read_callbacks.len());
        if n == 0 {
            return Ok(());
        }
        let mut buf = vec![0u8; n];
        self.port_mut()?.read_exact(&mut buf)?;
        for b in buf {
            match self.read_callbacks.pop_front() {
                Some(ReadSlot::Fetch(mut cb)) => cb(b),
                Some(ReadSlot::ProgressMark) => {
                    assert_eq!(b, PROGRESS_MARK, "lost sync with progress mark");
                    self.unprocessed -= CHUNKSIZE;
                }
                None => {}
            }
        }
        Ok(())
    }
}

impl Backend for Serial {
    type Pin = &'static str;

    fn output_pins(&self) -> HashSet<&'static str> {
        self.pins.keys().copied().collect()
    }

    fn input_pins(&self) -> HashSet<&'static str> {
        self.pins.keys().copied().collect()
    }

    fn open(&mut self) -> Result<()> {
        let settings = SerialPortSettings {
            baud_rate: self.baud,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_millis(50),
        };
        self.port = Some(serialport::open_with_settings(&self.device, &settings)?);
        self.reset_mcu()
    }

    fn close(&mut self) -> Result<()> {
        if self.port.is_some() {
            self.flush()?;
            self.reset_mcu()?;
            self.port = None;
        }
        Ok(())
    }

    fn set_as_input(&mut self, pin: &'static str) -> Result<()> {
        let idx = self.index(pin)?;
        self.send(OP_SET_AS_INPUT | idx)?;
        self.pin_state.insert(pin, None);
        Ok(())
    }

    fn set_as_output(&mut self, pin: &'static str) -> Result<()> {
        let idx = self.index(pin)?;
        self.send(OP_SET_AS_OUTPUT | idx)?;
        self.pin_state.insert(pin, None);
        Ok(())
    }

    fn set_pin(&mut self, pin: &'static str, state: bool) -> Result<()> {
        if self.pin_state.get(pin).copied().flatten() != Some(state) {
            let idx = self.index(pin)?;
            let op = if state { OP_SETPIN_HIGH } else { OP_SETPIN_LOW };
            self.send(op | idx)?;
            self.pin_state.insert(pin, Some(state));
        }
        Ok(())
    }

    fn fetch_pin(&mut self, pin: &'static str, callback: FetchCallback) -> Result<()> {
        let idx = self.index(pin)?;
        self.read_callbacks.push_back(ReadSlot::Fetch(callback));
        self.send(OP_READ | idx)
    }

    fn wait(&mut self, seconds: f64) -> Result<()> {
        if seconds < 0.0 {
            return Err(Error::NegativeWait(seconds));
        }
        let mut usec = (seconds * 1e6).ceil() as i64;
        while usec > LOOP_TIME_US as i64 {
            usec -= LOOP_TIME_US as i64;
            let n = usec.min(31) as u8;
            usec -= n as i64;
            self.send(OP_WAIT_US | n)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Round-trip through a harmless read so every callback queued so
        // far, including pending progress marks, is forced to fire.
        if let Some(&first_pin) = self.pins.keys().next() {
            self.fetch_pin(first_pin, Box::new(|_| {}))?;
        }
        self.port_mut()?.flush()?;
        self.handle_read(None)
    }
}
