//! Symbolic-pin-to-backend-pin mapping, including the `IGNORED` sentinel
//! and the `KEY=VALUE` pin-map argument grammar the CLI front end uses.

use std::collections::HashMap;
use std::fmt::Debug;

/// One entry of the pin map: either a concrete backend pin, or `Ignored`,
/// meaning the symbolic pin is tied off in hardware and every operation on
/// it is a silent no-op. A tagged variant, not a shared sentinel object,
/// per the design notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMapping<P> {
    Physical(P),
    Ignored,
}

/// A frozen symbolic-pin -> backend-pin table.
pub type PinMap<P> = HashMap<String, PinMapping<P>>;

/// Parses `KEY=VALUE` bindings into a [`PinMap`] of numeric backend pins.
/// `VALUE = "_"` maps to [`PinMapping::Ignored`].
pub fn parse_numeric_pinmap<I, S>(bindings: I) -> PinMap<u32>
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
            } else if let Ok(n) = value.parse::<u32>() {
                PinMapping::Physical(n)
            } else {
                continue;
            };
            result.insert(key.to_string(), mapping);
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_numeric_pinmap() {
        let map = parse_numeric_pinmap(["SCK=11", "MOSI=10", "X=_"]);
        assert_eq!(map.get("SCK"), Some(&PinMapping::Physical(11)));
        assert_eq!(map.get("MOSI"), Some(&PinMapping::Physical(10)));
        assert_eq!(map.get("X"), Some(&PinMapping::Ignored));
    }
}
