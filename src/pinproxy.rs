//! Maps symbolic target pins onto a backend's pins, tracks pin direction,
//! and accumulates asynchronously-sampled input bits per symbolic pin.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::pinmap::{PinMap, PinMapping};

/// Direction a symbolic pin has been configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// Adapter between a driver's symbolic pin names and a concrete
/// [`Backend`]'s pins, with direction tracking and per-pin input bit
/// queues. Acts as a scoped handle: construction validates the pin map,
/// and the backend is opened/closed around the lifetime of this value via
/// [`PinProxy::scoped`].
pub struct PinProxy<B: Backend> {
    backend: B,
    pinmap: PinMap<B::Pin>,
    directions: HashMap<String, Direction>,
    input_buffers: HashMap<String, Rc<RefCell<VecDeque<u8>>>>,
}

impl<B: Backend> PinProxy<B>
where
    B::Pin: Eq + Hash + Copy + Debug,
{
    /// Validates `pinmap` against the backend's declared capability sets
    /// and returns a proxy. Every non-ignored mapped pin must appear in the
    /// backend's input-or-output pin set.
    pub fn new(backend: B, pinmap: PinMap<B::Pin>) -> Result<Self> {
        let available: HashSet<B::Pin> = backend
            .output_pins()
            .into_iter()
            .chain(backend.input_pins())
            .collect();

        for mapping in pinmap.values() {
            if let PinMapping::Physical(p) = mapping {
                if !available.contains(p) {
                    return Err(Error::UnknownPin(format!("{:?}", p)));
                }
            }
        }

        Ok(PinProxy {
            backend,
            pinmap,
            directions: HashMap::new(),
            input_buffers: HashMap::new(),
        })
    }

    /// Runs `f` with the backend opened, guaranteeing `close` runs on every
    /// exit path including an error return from `f`.
    pub fn scoped<F, T>(mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.backend.open()?;
        let result = f(&mut self);
        let close_result = self.backend.close();
        let value = result?;
        close_result?;
        Ok(value)
    }

    fn lpin(&self, tpin: &str) -> Result<PinMapping<B::Pin>> {
        self.pinmap
            .get(tpin)
            .copied()
            .ok_or_else(|| Error::UnassignedPin(tpin.to_string()))
    }

    fn capability(&self, direction: Direction) -> HashSet<B::Pin> {
        match direction {
            Direction::Out => self.backend.output_pins(),
            Direction::In => self.backend.input_pins(),
        }
    }

    fn set_direction(&mut self, tpin: &str, direction: Direction) -> Result<()> {
        let lpin = self.lpin(tpin)?;
        if let PinMapping::Physical(p) = lpin {
            if self.directions.get(tpin) != Some(&direction) {
                if !self.capability(direction).contains(&p) {
                    return Err(Error::DirectionUnsupported(tpin.to_string(), direction));
                }
                match direction {
                    Direction::Out => self.backend.set_as_output(p)?,
                    Direction::In => self.backend.set_as_input(p)?,
                }
            }
        }
        self.directions.insert(tpin.to_string(), direction);
        Ok(())
    }

    fn check_direction(&self, tpin: &str, expected: Direction) -> Result<()> {
        if self.directions.get(tpin) != Some(&expected) {
            return Err(Error::DirectionMismatch(tpin.to_string(), expected));
        }
        Ok(())
    }

    /// Sets every given symbolic pin's direction to input.
    pub fn set_as_input(&mut self, tpins: &[&str]) -> Result<()> {
        for &tpin in tpins {
            self.set_direction(tpin, Direction::In)?;
        }
        Ok(())
    }

    /// Sets every given symbolic pin's direction to output.
    pub fn set_as_output(&mut self, tpins: &[&str]) -> Result<()> {
        for &tpin in tpins {
            self.set_direction(tpin, Direction::Out)?;
        }
        Ok(())
    }

    /// Drives `tpin` to `state`. `tpin` must be configured as output.
    /// A no-op on pins mapped to `Ignored`.
    pub fn set_pin(&mut self, tpin: &str, state: bool) -> Result<()> {
        self.check_direction(tpin, Direction::Out)?;
        if let PinMapping::Physical(p) = self.lpin(tpin)? {
            self.backend.set_pin(p, state)?;
        }
        Ok(())
    }

    /// Convenience for `set_pin(tpin, true)`.
    pub fn set(&mut self, tpin: &str) -> Result<()> {
        self.set_pin(tpin, true)
    }

    /// Drives `tpin` low.
    pub fn reset_pin(&mut self, tpin: &str) -> Result<()> {
        self.set_pin(tpin, false)
    }

    /// Enqueues a backend fetch of `tpin`; the sampled bit is appended to
    /// this pin's bit queue once the backend's callback fires. `tpin` must
    /// be configured as input. A no-op on pins mapped to `Ignored`.
    pub fn fetch_pin(&mut self, tpin: &str) -> Result<()> {
        self.check_direction(tpin, Direction::In)?;
        if let PinMapping::Physical(p) = self.lpin(tpin)? {
            let queue = self
                .input_buffers
                .entry(tpin.to_string())
                .or_insert_with(|| Rc::new(RefCell::new(VecDeque::new())))
                .clone();
            self.backend.fetch_pin(
                p,
                Box::new(move |bit| {
                    queue.borrow_mut().push_back(bit);
                }),
            )?;
        }
        Ok(())
    }

    /// Forwards to the backend.
    pub fn wait(&mut self, seconds: f64) -> Result<()> {
        self.backend.wait(seconds)
    }

    /// Forwards to the backend. Guarantees all prior fetches have been
    /// reified into the bit queues before returning.
    pub fn flush(&mut self) -> Result<()> {
        self.backend.flush()
    }

    /// Flushes, then consumes bits from `tpin`'s queue in groups of
    /// `n_bits`, packing each group into an integer. When `lsb` is false
    /// (the default in the source protocol), the first bit consumed is the
    /// most-significant bit of the produced integer; when true, it's the
    /// least-significant. Stops once fewer than `n_bits` remain or
    /// `n_values` integers have been produced (`None` means unlimited).
    /// Leftover bits stay queued for a later call.
    pub fn pop_fetched(
        &mut self,
        tpin: &str,
        n_bits: u32,
        n_values: Option<usize>,
        lsb: bool,
    ) -> Result<Vec<u32>> {
        self.flush()?;
        let queue = self
            .input_buffers
            .entry(tpin.to_string())
            .or_insert_with(|| Rc::new(RefCell::new(VecDeque::new())))
            .clone();
        let mut queue = queue.borrow_mut();

        let mut result = Vec::new();
        while queue.len() as u32 >= n_bits {
            if let Some(n) = n_values {
                if result.len() >= n {
                    break;
                }
            }
            let mut value: u32 = 0;
            for i in 0..n_bits {
                let bit = queue.pop_front().unwrap() as u32;
                let shift = if lsb { i } else { n_bits - 1 - i };
                value |= bit << shift;
            }
            result.push(value);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::Backend;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Scriptable mock backend for pin-proxy tests:
    /// output pins {2,3,6,7}, input pins {0,1,6,7}.
    #[derive(Default)]
    struct MockBackend {
        set_pin_calls: Rc<RefCell<Vec<(u32, bool)>>>,
        fetch_calls: Rc<RefCell<u32>>,
    }

    impl Backend for MockBackend {
        type Pin = u32;

        fn output_pins(&self) -> HashSet<u32> {
            [2, 3, 6, 7].iter().copied().collect()
        }
        fn input_pins(&self) -> HashSet<u32> {
            [0, 1, 6, 7].iter().copied().collect()
        }
        fn open(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
        fn set_as_input(&mut self, _pin: u32) -> Result<()> {
            Ok(())
        }
        fn set_as_output(&mut self, _pin: u32) -> Result<()> {
            Ok(())
        }
        fn set_pin(&mut self, pin: u32, state: bool) -> Result<()> {
            self.set_pin_calls.borrow_mut().push((pin, state));
            Ok(())
        }
        fn fetch_pin(&mut self, _pin: u32, mut callback: crate::backend::FetchCallback) -> Result<()> {
            *self.fetch_calls.borrow_mut() += 1;
            callback(1);
            Ok(())
        }
        fn wait(&mut self, _seconds: f64) -> Result<()> {
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn fixture() -> PinProxy<MockBackend> {
        let mut pinmap = PinMap::new();
        pinmap.insert("I1".into(), PinMapping::Physical(0));
        pinmap.insert("O1".into(), PinMapping::Physical(2));
        pinmap.insert("IO1".into(), PinMapping::Physical(6));
        pinmap.insert("X".into(), PinMapping::Ignored);
        PinProxy::new(MockBackend::default(), pinmap).unwrap()
    }

    #[test]
    fn test_direction_unsupported() {
        let mut p = fixture();
        assert!(matches!(
            p.set_as_output(&["I1"]),
            Err(Error::DirectionUnsupported(_, Direction::Out))
        ));
    }

    #[test]
    fn test_ignored_pin_is_noop() {
        let mut p = fixture();
        p.set_as_output(&["X"]).unwrap();
        p.set_pin("X", true).unwrap();
        assert_eq!(p.backend.set_pin_calls.borrow().len(), 0);
    }

    #[test]
    fn test_output_pin_reaches_backend_once() {
        let mut p = fixture();
        p.set_as_output(&["O1"]).unwrap();
        p.set_pin("O1", true).unwrap();
        assert_eq!(*p.backend.set_pin_calls.borrow(), vec![(2, true)]);
    }

    #[test]
    fn test_direction_mismatch() {
        let mut p = fixture();
        p.set_as_input(&["I1"]).unwrap();
        assert!(matches!(
            p.set_pin("I1", true),
            Err(Error::DirectionMismatch(_, Direction::Out))
        ));
    }

    #[test]
    fn test_pop_fetched_orders_msb_and_lsb() {
        let mut p = fixture();
        p.set_as_input(&["I1"]).unwrap();
        p.input_buffers.insert(
            "I1".to_string(),
            Rc::new(RefCell::new(
                vec![1, 0, 1, 0, 1, 0, 1, 0, 0, 1, 0, 1, 0, 1, 0, 1]
                    .into_iter()
                    .collect(),
            )),
        );
        assert_eq!(
            p.pop_fetched("I1", 8, None, true).unwrap(),
            vec![0x55, 0xAA]
        );
    }

    #[test]
    fn test_pop_fetched_msb_default() {
        let mut p = fixture();
        p.set_as_input(&["I1"]).unwrap();
        p.input_buffers.insert(
            "I1".to_string(),
            Rc::new(RefCell::new(
                vec![1, 0, 1, 0, 1, 0, 1, 0, 0, 1, 0, 1, 0, 1, 0, 1]
                    .into_iter()
                    .collect(),
            )),
        );
        assert_eq!(
            p.pop_fetched("I1", 8, None, false).unwrap(),
            vec![0xAA, 0x55]
        );
        assert_eq!(
            p.pop_fetched("I1", 16, None, false).unwrap(),
            Vec::<u32>::new()
        );
    }

    #[test]
    fn test_pop_fetched_word() {
        let mut p = fixture();
        p.set_as_input(&["I1"]).unwrap();
        p.input_buffers.insert(
            "I1".to_string(),
            Rc::new(RefCell::new(
                vec![1, 0, 1, 0, 1, 0, 1, 0, 0, 1, 0, 1, 0, 1, 0, 1]
                    .into_iter()
                    .collect(),
            )),
        );
        assert_eq!(p.pop_fetched("I1", 16, None, false).unwrap(), vec![0xAA55]);
    }
}
