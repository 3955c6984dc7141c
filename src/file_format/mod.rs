//! Text codecs for an address -> byte memory image.

mod hexdump;
mod intel_hex32;

pub use hexdump::Hexdump;
pub use intel_hex32::IntelHex32;

use std::io::BufRead;

use crate::error::Result;
use crate::mem::Mem;

/// A file format decodes a text stream into a [`Mem`] and encodes a [`Mem`]
/// back into the same textual form (not necessarily byte-identical, but
/// decode-stable: decoding the encoded output reproduces the same map).
pub trait FileFormat {
    fn decode(&self, reader: &mut dyn BufRead) -> Result<Mem>;
    fn encode(&self, mem: &Mem) -> Vec<String>;
}
