//! Plain "address data" hexdump format: one contiguous slice per line,
//! `<address-in-hex> <bytes-in-lowercase-hex>\n`.

use std::io::BufRead;

use super::FileFormat;
use crate::error::{Error, Result};
use crate::mem::{self, Mem};

/// The default hexdump format.
pub struct Hexdump;

impl FileFormat for Hexdump {
    fn decode(&self, reader: &mut dyn BufRead) -> Result<Mem> {
        let mut result = Mem::new();

        for (lineno, line) in reader.lines().enumerate() {
            let lineno = lineno + 1;
            let line = line.map_err(Error::Io)?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (address, data) = line
                .split_once(' ')
                .ok_or_else(|| Error::InvalidRecord {
                    line: lineno,
                    text: line.to_string(),
                })?;
            let address = u32::from_str_radix(address, 16).map_err(|_| Error::InvalidRecord {
                line: lineno,
                text: line.to_string(),
            })?;
            let bytes = parse_hex_bytes(data).ok_or_else(|| Error::InvalidRecord {
                line: lineno,
                text: line.to_string(),
            })?;

            for (offset, byte) in bytes.into_iter().enumerate() {
                result.insert(address + offset as u32, byte);
            }
        }
        Ok(result)
    }

    fn encode(&self, mem: &Mem) -> Vec<String> {
        if mem.is_empty() {
            return Vec::new();
        }
        let max_addr = *mem.keys().max().unwrap();
        let addr_width = if max_addr == 0 {
            0
        } else {
            ((32 - max_addr.leading_zeros()) as usize + 3) / 4
        };

        let mut lines = Vec::new();
        for page in mem::split_to_pages(mem, 16) {
            for subpage in mem::split_on_gaps(&page) {
                let slice_address = *subpage.keys().next().unwrap();
                let data: String = subpage.values().map(|b| format!("{:02x}", b)).collect();
                lines.push(format!("{:0width$x} {}\n", slice_address, data, width = addr_width));
            }
        }
        lines
    }
}

fn parse_hex_bytes(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_decode_and_reencode_roundtrip() {
        let text = "000d2f 99\n000d30 10\n300000 20\n";
        let mut cursor = Cursor::new(text);
        let mem = Hexdump.decode(&mut cursor).unwrap();
        assert_eq!(mem.get(&0xD2F), Some(&0x99));
        assert_eq!(mem.get(&0xD30), Some(&0x10));
        assert_eq!(mem.get(&0x300000), Some(&0x20));

        let reencoded: String = Hexdump.encode(&mem).concat();
        assert_eq!(reencoded, text);
    }

    #[test]
    fn test_decode_blank_lines_are_skipped() {
        let text = "000d2f 99\n\n   \n000d30 10\n";
        let mut cursor = Cursor::new(text);
        let mem = Hexdump.decode(&mut cursor).unwrap();
        assert_eq!(mem.len(), 2);
    }

    #[test]
    fn test_decode_invalid_line_errors() {
        let text = "not-a-valid-line\n";
        let mut cursor = Cursor::new(text);
        assert!(matches!(
            Hexdump.decode(&mut cursor),
            Err(Error::InvalidRecord { line: 1, .. })
        ));
    }

    #[test]
    fn test_encode_empty_mem() {
        assert!(Hexdump.encode(&Mem::new()).is_empty());
    }
}
