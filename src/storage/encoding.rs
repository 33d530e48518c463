//! Text encodings for entry files
//!
//! Serializers produce `String`s; this decides which bytes hit the disk.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StoreError};

/// Byte encoding used for entry file contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// UTF-8, no BOM
    #[default]
    Utf8,

    /// UTF-16 little endian, no BOM
    Utf16Le,

    /// ISO-8859-1: one byte per char, chars above U+00FF are rejected
    Latin1,
}

impl TextEncoding {
    /// Text -> bytes. Fails when the text has chars the encoding cannot hold.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Utf16Le => Ok(text
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect()),
            TextEncoding::Latin1 => text.chars().map(latin1_byte).collect(),
        }
    }

    /// Check that `text` can be encoded without producing the bytes
    pub fn check(&self, text: &str) -> Result<()> {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf16Le => Ok(()),
            TextEncoding::Latin1 => text.chars().try_for_each(|c| latin1_byte(c).map(drop)),
        }
    }

    /// Bytes -> text
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| StoreError::Serialization(format!("invalid utf8: {}", e))),
            TextEncoding::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(StoreError::Serialization(format!(
                        "odd byte length {} for utf16le",
                        bytes.len()
                    )));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units)
                    .map_err(|e| StoreError::Serialization(format!("invalid utf16le: {}", e)))
            }
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    /// Canonical label
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf8",
            TextEncoding::Utf16Le => "utf16le",
            TextEncoding::Latin1 => "latin1",
        }
    }
}

fn latin1_byte(c: char) -> Result<u8> {
    u8::try_from(c).map_err(|_| {
        StoreError::Serialization(format!(
            "char {:?} (U+{:04X}) not representable in latin1",
            c, c as u32
        ))
    })
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextEncoding {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(TextEncoding::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(TextEncoding::Utf16Le),
            "latin1" | "binary" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            other => Err(StoreError::Config(format!("unknown text encoding: {}", other))),
        }
    }
}
