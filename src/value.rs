// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed-value codec: text ↔ byte encoding for every value type the
//! engine can search, filter, and write.
//!
//! `TypedValue` carries its own type tag and knows how to encode/decode
//! itself; callers never branch on a string type name after parsing it
//! once in [`ValueType::parse`].

use crate::result::{Error, Result};
use std::fmt;

/// A value type the codec understands. Mirrors the original's
/// `Converter::Type` naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Ascii,
    Utf16,
    Utf32,
    Hex,
    I32Le,
    I32Be,
    I64Le,
    I64Be,
    F32Le,
    F32Be,
    F64Le,
    F64Be,
    F32FuzzyLe,
}

impl ValueType {
    /// Parses a command-line type name (case-insensitive) into a `ValueType`.
    pub fn parse(name: &str) -> Result<ValueType> {
        match name.to_ascii_lowercase().as_str() {
            "ascii" | "str" => Ok(ValueType::Ascii),
            "utf16" => Ok(ValueType::Utf16),
            "utf32" => Ok(ValueType::Utf32),
            "hex" => Ok(ValueType::Hex),
            "int" | "i32" => Ok(ValueType::I32Le),
            "int_big" | "i32be" => Ok(ValueType::I32Be),
            "long" | "i64" => Ok(ValueType::I64Le),
            "long_big" | "i64be" => Ok(ValueType::I64Be),
            "float" | "f32" => Ok(ValueType::F32Le),
            "float_big" | "f32be" => Ok(ValueType::F32Be),
            "double" | "f64" => Ok(ValueType::F64Le),
            "double_big" | "f64be" => Ok(ValueType::F64Be),
            "float_fuzzy" | "fuzzy" => Ok(ValueType::F32FuzzyLe),
            other => Err(Error::Usage(format!("unknown type '{other}'"))),
        }
    }

    /// Fixed encoded length, or `None` for variable-width types.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            ValueType::I32Le | ValueType::I32Be | ValueType::F32Le
            | ValueType::F32Be | ValueType::F32FuzzyLe => Some(4),
            ValueType::I64Le | ValueType::I64Be | ValueType::F64Le
            | ValueType::F64Be => Some(8),
            ValueType::Ascii | ValueType::Utf16 | ValueType::Utf32
            | ValueType::Hex => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Ascii => "ascii",
            ValueType::Utf16 => "utf16",
            ValueType::Utf32 => "utf32",
            ValueType::Hex => "hex",
            ValueType::I32Le => "int",
            ValueType::I32Be => "int_big",
            ValueType::I64Le => "long",
            ValueType::I64Be => "long_big",
            ValueType::F32Le => "float",
            ValueType::F32Be => "float_big",
            ValueType::F64Le => "double",
            ValueType::F64Be => "double_big",
            ValueType::F32FuzzyLe => "float_fuzzy",
        }
    }

    fn is_fuzzy(&self) -> bool {
        matches!(self, ValueType::F32FuzzyLe)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A `(type, bytes)` pair. Ordered lexicographically on `bytes` only —
/// set membership and sorting never consult the type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedValue {
    ty: ValueType,
    bytes: Vec<u8>,
}

impl PartialOrd for TypedValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypedValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl TypedValue {
    pub fn new(ty: ValueType, bytes: Vec<u8>) -> TypedValue {
        TypedValue { ty, bytes }
    }

    /// Parses `text` according to `ty` into a `TypedValue`.
    pub fn encode(ty: ValueType, text: &str) -> Result<TypedValue> {
        let bytes = match ty {
            ValueType::Ascii => text.as_bytes().to_vec(),
            ValueType::Utf16 => text
                .bytes()
                .flat_map(|c| [0u8, c])
                .collect(),
            ValueType::Utf32 => text
                .bytes()
                .flat_map(|c| [0u8, 0u8, 0u8, c])
                .collect(),
            ValueType::Hex => decode_hex(text)?,
            ValueType::I32Le | ValueType::I32Be => {
                let v: i32 = text
                    .trim()
                    .parse()
                    .map_err(|_| Error::Usage(format!("not an int32: '{text}'")))?;
                let mut b = v.to_le_bytes().to_vec();
                if ty == ValueType::I32Be {
                    b.reverse();
                }
                b
            }
            ValueType::I64Le | ValueType::I64Be => {
                let v: i64 = text
                    .trim()
                    .parse()
                    .map_err(|_| Error::Usage(format!("not an int64: '{text}'")))?;
                let mut b = v.to_le_bytes().to_vec();
                if ty == ValueType::I64Be {
                    b.reverse();
                }
                b
            }
            ValueType::F32Le | ValueType::F32Be | ValueType::F32FuzzyLe => {
                let v: f32 = text
                    .trim()
                    .parse()
                    .map_err(|_| Error::Usage(format!("not a float: '{text}'")))?;
                let mut b = v.to_le_bytes().to_vec();
                if ty == ValueType::F32Be {
                    b.reverse();
                }
                b
            }
            ValueType::F64Le | ValueType::F64Be => {
                let v: f64 = text
                    .trim()
                    .parse()
                    .map_err(|_| Error::Usage(format!("not a double: '{text}'")))?;
                let mut b = v.to_le_bytes().to_vec();
                if ty == ValueType::F64Be {
                    b.reverse();
                }
                b
            }
        };
        Ok(TypedValue { ty, bytes })
    }

    /// Renders the stored bytes back to text, per `ty`.
    pub fn decode(&self) -> String {
        match self.ty {
            ValueType::Ascii => String::from_utf8_lossy(&self.bytes).into_owned(),
            ValueType::Utf16 => self.bytes.chunks(2).map(|c| c[1] as char).collect(),
            ValueType::Utf32 => self.bytes.chunks(4).map(|c| c[3] as char).collect(),
            ValueType::Hex => encode_hex(&self.bytes),
            ValueType::I32Le | ValueType::I32Be => {
                let mut b = [0u8; 4];
                b.copy_from_slice(&self.bytes);
                if self.ty == ValueType::I32Be {
                    b.reverse();
                }
                i32::from_le_bytes(b).to_string()
            }
            ValueType::I64Le | ValueType::I64Be => {
                let mut b = [0u8; 8];
                b.copy_from_slice(&self.bytes);
                if self.ty == ValueType::I64Be {
                    b.reverse();
                }
                i64::from_le_bytes(b).to_string()
            }
            ValueType::F32Le | ValueType::F32Be | ValueType::F32FuzzyLe => {
                let mut b = [0u8; 4];
                b.copy_from_slice(&self.bytes);
                if self.ty == ValueType::F32Be {
                    b.reverse();
                }
                f32::from_le_bytes(b).to_string()
            }
            ValueType::F64Le | ValueType::F64Be => {
                let mut b = [0u8; 8];
                b.copy_from_slice(&self.bytes);
                if self.ty == ValueType::F64Be {
                    b.reverse();
                }
                f64::from_le_bytes(b).to_string()
            }
        }
    }

    pub fn ty(&self) -> ValueType {
        self.ty
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoded length in bytes; the memory footprint a candidate at this
    /// value occupies.
    pub fn footprint(&self) -> usize {
        self.bytes.len()
    }

    /// Whether `mem` at this type's width is within the fuzzy window
    /// around this value (only meaningful for `F32FuzzyLe`); for every
    /// other type this is a plain byte-equality check.
    pub fn matches(&self, mem: &[u8]) -> bool {
        if mem.len() != self.bytes.len() {
            return false;
        }
        if self.ty.is_fuzzy() {
            let mut a = [0u8; 4];
            let mut b = [0u8; 4];
            a.copy_from_slice(&self.bytes);
            b.copy_from_slice(mem);
            let want = f32::from_le_bytes(a);
            let got = f32::from_le_bytes(b);
            !got.is_nan() && got >= want - 0.55 && got <= want + 1.05
        } else {
            mem == self.bytes.as_slice()
        }
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes a hex string (whitespace skipped) into bytes. Unlike the
/// original, this correctly rejects non-hex-digit characters instead of
/// silently accepting them.
fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.len().is_multiple_of(2) {
        return Err(Error::Usage(format!("odd number of hex digits in '{text}'")));
    }
    let mut out = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks(2) {
        for c in pair {
            if !c.is_ascii_hexdigit() {
                return Err(Error::Usage(format!("invalid hex digit '{c}'")));
            }
        }
        let s: String = pair.iter().collect();
        out.push(u8::from_str_radix(&s, 16).unwrap());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trip() {
        let v = TypedValue::encode(ValueType::Ascii, "hi").unwrap();
        assert_eq!(v.decode(), "hi");
    }

    #[test]
    fn hex_round_trip() {
        let v = TypedValue::encode(ValueType::Hex, "deadbeef").unwrap();
        assert_eq!(v.bytes(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(v.decode(), "deadbeef");
    }

    #[test]
    fn hex_rejects_garbage() {
        assert!(TypedValue::encode(ValueType::Hex, "zz").is_err());
        assert!(TypedValue::encode(ValueType::Hex, "abc").is_err());
    }

    #[test]
    fn int_round_trip() {
        let v = TypedValue::encode(ValueType::I32Le, "123456789").unwrap();
        assert_eq!(v.decode(), "123456789");
    }

    #[test]
    fn endian_symmetry_i32() {
        let le = TypedValue::encode(ValueType::I32Le, "123456789").unwrap();
        let be = TypedValue::encode(ValueType::I32Be, "123456789").unwrap();
        let mut rev = le.bytes().to_vec();
        rev.reverse();
        assert_eq!(be.bytes(), rev.as_slice());
    }

    #[test]
    fn endian_symmetry_f64() {
        let le = TypedValue::encode(ValueType::F64Le, "3.5").unwrap();
        let be = TypedValue::encode(ValueType::F64Be, "3.5").unwrap();
        let mut rev = le.bytes().to_vec();
        rev.reverse();
        assert_eq!(be.bytes(), rev.as_slice());
    }

    #[test]
    fn fuzzy_window() {
        let v = TypedValue::encode(ValueType::F32FuzzyLe, "100").unwrap();
        assert!(v.matches(&100.3f32.to_le_bytes()));
        assert!(v.matches(&99.5f32.to_le_bytes()));
        assert!(!v.matches(&101.1f32.to_le_bytes()));
        assert!(!v.matches(&f32::NAN.to_le_bytes()));
    }

    #[test]
    fn ordering_is_lexicographic_on_bytes() {
        let a = TypedValue::new(ValueType::I32Le, vec![1, 0, 0, 0]);
        let b = TypedValue::new(ValueType::Ascii, vec![2, 0, 0, 0]);
        assert!(a < b);
    }
}
