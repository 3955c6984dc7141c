//! Resolves `NAME=VALUE` pin-map bindings against the serial backend's
//! fixed `&'static str` pin table, the way [`pinflash::pinmap::parse_numeric_pinmap`]
//! resolves them to plain integers for the numeric-pin backends.

use pinflash::pinmap::{PinMap, PinMapping};

const KNOWN_PINS: &[&str] = &["D0", "D1", "D2", "D3", "D5", "D6", "D7", "D8"];

fn static_pin(value: &str) -> Option<&'static str> {
    KNOWN_PINS.iter().copied().find(|&known| known == value)
}

/// Like [`pinflash::pinmap::parse_numeric_pinmap`], but for the serial
/// backend's co-processor pin names instead of plain integers. Bindings
/// whose value doesn't name a known pin are silently skipped.
pub fn parse_static_pinmap<I, S>(bindings: I) -> PinMap<&'static str>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = PinMap::new();
    for binding in bindings {
        let binding = binding.as_ref();
        if let Some((key, value)) = binding.split_once('=') {
            let key = key.trim();
            let value = value.trim();
            let mapping = if value == "_" {
                PinMapping::Ignored
            } else if let Some(p) = static_pin(value) {
                PinMapping::Physical(p)
            } else {
                continue;
            };
            result.insert(key.to_string(), mapping);
        }
    }
    result
}
