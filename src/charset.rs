//! EBCDIC to Unicode translation.
//!
//! A pure, stateless collaborator per §4.8: `ebcdic_to_unicode` and
//! `unicode_to_multibyte`/`unicode_to_printer`. The printer core treats
//! code-page selection as an external concern, but needs a concrete
//! table to exercise the rest of the pipeline — CP037 (EBCDIC US/Canada)
//! is carried over from the CP037 table in the source codebase, extended
//! with an optional `xtable` remap overlay per
//! `original_source/Common/pr3287/xtable.c`.

use std::collections::HashMap;

/// Host code page selecting which EBCDIC table is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharSet {
    Cp037,
    Cp500,
}

/// Expansion behavior for characters with no direct printable mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandOption {
    /// No special expansion; control codes map through verbatim.
    None,
    /// APL/line-drawing glyphs expand to their closest ASCII analog.
    ApellFallback,
}

const EBCDIC_CP037_TO_UNICODE: [char; 256] = [
    '\x00', '\x01', '\x02', '\x03', '\u{009C}', '\t', '\u{0086}', '\x7F',
    '\u{0097}', '\u{008D}', '\u{008E}', '\x0B', '\x0C', '\r', '\x0E', '\x0F',
    '\x10', '\x11', '\x12', '\x13', '\u{009D}', '\u{0085}', '\x08', '\u{0087}',
    '\x18', '\x19', '\u{0092}', '\u{008F}', '\x1C', '\x1D', '\x1E', '\x1F',
    '\u{0080}', '\u{0081}', '\u{0082}', '\u{0083}', '\u{0084}', '\n', '\x17', '\x1B',
    '\u{0088}', '\u{0089}', '\u{008A}', '\u{008B}', '\u{008C}', '\x05', '\x06', '\x07',
    '\u{0090}', '\u{0091}', '\x16', '\u{0093}', '\u{0094}', '\u{0095}', '\u{0096}', '\x04',
    '\u{0098}', '\u{0099}', '\u{009A}', '\u{009B}', '\x14', '\x15', '\u{009E}', '\x1A',
    ' ', '\u{00A0}', '\u{00E2}', '\u{00E4}', '\u{00E0}', '\u{00E1}', '\u{00E3}', '\u{00E5}',
    '\u{00E7}', '\u{00F1}', '\u{00A2}', '.', '<', '(', '+', '|',
    '&', '\u{00E9}', '\u{00EA}', '\u{00EB}', '\u{00E8}', '\u{00ED}', '\u{00EE}', '\u{00EF}',
    '\u{00EC}', '\u{00DF}', '!', '$', '*', ')', ';', '\u{00AC}',
    '-', '/', '\u{00C2}', '\u{00C4}', '\u{00C0}', '\u{00C1}', '\u{00C3}', '\u{00C5}',
    '\u{00C7}', '\u{00D1}', '\u{00A6}', ',', '%', '_', '>', '?',
    '\u{00F8}', '\u{00C9}', '\u{00CA}', '\u{00CB}', '\u{00C8}', '\u{00CD}', '\u{00CE}', '\u{00CF}',
    '\u{00CC}', '`', ':', '#', '@', '\'', '=', '"',
    '\u{00D8}', 'a', 'b', 'c', 'd', 'e', 'f', 'g',
    'h', 'i', '\u{00AB}', '\u{00BB}', '\u{00F0}', '\u{00FD}', '\u{00FE}', '\u{00B1}',
    '\u{00B0}', 'j', 'k', 'l', 'm', 'n', 'o', 'p',
    'q', 'r', '\u{00AA}', '\u{00BA}', '\u{00E6}', '\u{00B8}', '\u{00C6}', '\u{00A4}',
    '\u{00B5}', '~', 's', 't', 'u', 'v', 'w', 'x',
    'y', 'z', '\u{00A1}', '\u{00BF}', '\u{00D0}', '\u{00DD}', '\u{00DE}', '\u{00AE}',
    '^', '\u{00A3}', '\u{00A5}', '\u{00B7}', '\u{00A9}', '\u{00A7}', '\u{00B6}', '\u{00BC}',
    '\u{00BD}', '\u{00BE}', '[', ']', '\u{00AF}', '\u{00A8}', '\u{00B4}', '\u{00D7}',
    '{', 'A', 'B', 'C', 'D', 'E', 'F', 'G',
    'H', 'I', '\u{00AD}', '\u{00F4}', '\u{00F6}', '\u{00F2}', '\u{00F3}', '\u{00F5}',
    '}', 'J', 'K', 'L', 'M', 'N', 'O', 'P',
    'Q', 'R', '\u{00B9}', '\u{00FB}', '\u{00FC}', '\u{00F9}', '\u{00FA}', '\u{00FF}',
    '\\', '\u{00F7}', 'S', 'T', 'U', 'V', 'W', 'X',
    'Y', 'Z', '\u{00B2}', '\u{00D4}', '\u{00D6}', '\u{00D2}', '\u{00D3}', '\u{00D5}',
    '0', '1', '2', '3', '4', '5', '6', '7',
    '8', '9', '\u{00B3}', '\u{00DB}', '\u{00DC}', '\u{00D9}', '\u{00DA}', '\u{009F}',
];

/// CP500 (EBCDIC International) differs from CP037 only at a handful of
/// positions; the table here overlays those differences on CP037.
const CP500_OVERRIDES: &[(u8, char)] = &[
    (0x4A, '\u{00A2}'),
    (0x5A, '!'),
    (0x5F, '\u{00AC}'),
    (0xB5, '\u{00A4}'),
    (0xBA, '!'),
    (0xBB, '$'),
];

/// Overlay consulted before the code-page table, populated from the
/// `xtable` CLI option (`config::Options::xtable`).
#[derive(Debug, Clone, Default)]
pub struct XTable {
    overrides: HashMap<u8, char>,
}

impl XTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an xtable file's contents: one `ebcdic_hex unicode_hex` pair
    /// per line, `#`-prefixed comments and blank lines ignored.
    pub fn parse(contents: &str) -> Self {
        let mut overrides = HashMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(ebc), Some(uni)) = (parts.next(), parts.next()) else {
                continue;
            };
            let (Ok(ebc), Ok(uni)) = (
                u8::from_str_radix(ebc.trim_start_matches("0x"), 16),
                u32::from_str_radix(uni.trim_start_matches("0x"), 16),
            ) else {
                continue;
            };
            if let Some(ch) = char::from_u32(uni) {
                overrides.insert(ebc, ch);
            }
        }
        XTable { overrides }
    }

    fn lookup(&self, ebc: u8) -> Option<char> {
        self.overrides.get(&ebc).copied()
    }
}

/// `ebcdic_to_unicode(ebc, cs, euo)` per §4.8: stateless, deterministic
/// per code page, consulting an optional xtable overlay first.
pub fn ebcdic_to_unicode(ebc: u8, cs: CharSet, _euo: ExpandOption, xtable: Option<&XTable>) -> char {
    if let Some(xt) = xtable {
        if let Some(ch) = xt.lookup(ebc) {
            return ch;
        }
    }
    match cs {
        CharSet::Cp037 => EBCDIC_CP037_TO_UNICODE[ebc as usize],
        CharSet::Cp500 => CP500_OVERRIDES
            .iter()
            .find(|(b, _)| *b == ebc)
            .map(|(_, ch)| *ch)
            .unwrap_or(EBCDIC_CP037_TO_UNICODE[ebc as usize]),
    }
}

/// Encode a Unicode scalar value as UTF-8 bytes into `out`, returning
/// the number of bytes written. Used by the POSIX printer path.
pub fn unicode_to_multibyte(u: char, out: &mut [u8]) -> usize {
    u.encode_utf8(out).len()
}

/// Encode a Unicode scalar value for the Windows printer path using the
/// selected code page; falls back to `unicode_to_multibyte` (UTF-8) when
/// the character has no single-byte representation in the page.
pub fn unicode_to_printer(u: char, cs: CharSet, out: &mut [u8]) -> usize {
    let table = match cs {
        CharSet::Cp037 => &EBCDIC_CP037_TO_UNICODE,
        CharSet::Cp500 => &EBCDIC_CP037_TO_UNICODE,
    };
    if let Some(pos) = table.iter().position(|&c| c == u) {
        out[0] = pos as u8;
        1
    } else {
        unicode_to_multibyte(u, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_letters() {
        assert_eq!(ebcdic_to_unicode(0xC8, CharSet::Cp037, ExpandOption::None, None), 'H');
        assert_eq!(ebcdic_to_unicode(0xC9, CharSet::Cp037, ExpandOption::None, None), 'I');
    }

    #[test]
    fn xtable_overrides_code_page() {
        let xt = XTable::parse("0xC8 0x2605\n");
        assert_eq!(
            ebcdic_to_unicode(0xC8, CharSet::Cp037, ExpandOption::None, Some(&xt)),
            '\u{2605}'
        );
        assert_eq!(ebcdic_to_unicode(0xC9, CharSet::Cp037, ExpandOption::None, Some(&xt)), 'I');
    }

    #[test]
    fn round_trips_through_utf8() {
        let mut buf = [0u8; 4];
        let n = unicode_to_multibyte('H', &mut buf);
        assert_eq!(&buf[..n], b"H");
    }
}
