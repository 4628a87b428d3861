//! Character set registry.
//!
//! The registry is built once on first use and never mutated afterwards.
//!
//! ```
//! use firebro::charset;
//!
//! let utf8 = charset::by_name("utf8").unwrap();
//! assert_eq!(utf8.id(), 4);
//! assert_eq!(utf8.decode(&utf8.encode("héllo").unwrap()), "héllo");
//! ```
use encoding_rs::Encoding;
use std::{borrow::Cow, fmt, sync::LazyLock};

use crate::types::ConversionError;

/// Engine character set.
pub struct Charset {
    id: u8,
    name: &'static str,
    bytes_per_char: u8,
    encoding: TextEncoding,
}

#[derive(Clone, Copy)]
enum TextEncoding {
    /// No conversion, text stored as given.
    None,
    /// Opaque bytes.
    Octets,
    Ascii,
    Utf8,
    Legacy(&'static Encoding),
}

impl Charset {
    /// Engine character set id.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Engine character set name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Maximum bytes of one character.
    pub fn bytes_per_char(&self) -> usize {
        self.bytes_per_char as usize
    }

    /// Returns `true` for `OCTETS`, where text fields are raw byte buffers.
    pub fn is_octets(&self) -> bool {
        matches!(self.encoding, TextEncoding::Octets)
    }

    /// Returns `true` for `NONE`.
    pub fn is_none(&self) -> bool {
        matches!(self.encoding, TextEncoding::None)
    }

    /// Encode string into the character set bytes.
    pub fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, ConversionError> {
        match self.encoding {
            TextEncoding::None | TextEncoding::Octets | TextEncoding::Utf8 => {
                Ok(Cow::Borrowed(text.as_bytes()))
            },
            TextEncoding::Ascii if text.is_ascii() => Ok(Cow::Borrowed(text.as_bytes())),
            TextEncoding::Ascii => Err(ConversionError::Charset { charset: self.name }),
            TextEncoding::Legacy(encoding) => {
                let (bytes, _, unmappable) = encoding.encode(text);
                if unmappable {
                    return Err(ConversionError::Charset { charset: self.name });
                }
                Ok(bytes)
            },
        }
    }

    /// Decode the whole buffer.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self.encoding {
            TextEncoding::None
            | TextEncoding::Octets
            | TextEncoding::Ascii
            | TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Legacy(encoding) => {
                encoding.decode_without_bom_handling(bytes).0.into_owned()
            },
        }
    }

    /// Decode `len` bytes starting at `offset`.
    ///
    /// Range outside of `bytes` is clamped.
    pub fn decode_at(&self, bytes: &[u8], offset: usize, len: usize) -> String {
        let start = offset.min(bytes.len());
        let end = offset.saturating_add(len).min(bytes.len());
        self.decode(&bytes[start..end])
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Charset")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("bytes_per_char", &self.bytes_per_char)
            .finish()
    }
}

impl PartialEq for Charset {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Charset { }

/// `(id, name, bytes per char, encoding label)`
const TABLE: &[(u8, &str, u8, &str)] = &[
    (0, "NONE", 1, ""),
    (1, "OCTETS", 1, ""),
    (2, "ASCII", 1, ""),
    (3, "UNICODE_FSS", 3, "utf-8"),
    (4, "UTF8", 4, "utf-8"),
    (5, "SJIS_0208", 2, "shift_jis"),
    (6, "EUCJ_0208", 2, "euc-jp"),
    (7, "ISO2022-JP", 2, "iso-2022-jp"),
    (10, "DOS437", 1, "ibm437"),
    (11, "DOS850", 1, "ibm850"),
    (12, "DOS865", 1, "ibm865"),
    (13, "DOS860", 1, "ibm860"),
    (14, "DOS863", 1, "ibm863"),
    (21, "ISO8859_1", 1, "iso-8859-1"),
    (22, "ISO8859_2", 1, "iso-8859-2"),
    (44, "KSC_5601", 2, "ks_c_5601-1987"),
    (47, "DOS861", 1, "ibm861"),
    (51, "WIN1250", 1, "windows-1250"),
    (52, "WIN1251", 1, "windows-1251"),
    (53, "WIN1252", 1, "windows-1252"),
    (54, "WIN1253", 1, "windows-1253"),
    (55, "WIN1254", 1, "windows-1254"),
    (56, "BIG_5", 2, "big5"),
    (57, "GB_2312", 2, "gb2312"),
    (58, "WIN1255", 1, "windows-1255"),
    (59, "WIN1256", 1, "windows-1256"),
    (60, "WIN1257", 1, "windows-1257"),
    (63, "KOI8R", 2, "koi8-r"),
    (64, "KOI8U", 2, "koi8-u"),
    (65, "TIS620", 1, "tis-620"),
];

static REGISTRY: LazyLock<Vec<Charset>> = LazyLock::new(|| {
    TABLE
        .iter()
        .filter_map(|&(id, name, bytes_per_char, label)| {
            let encoding = match id {
                0 => TextEncoding::None,
                1 => TextEncoding::Octets,
                2 => TextEncoding::Ascii,
                3 | 4 => TextEncoding::Utf8,
                _ => match Encoding::for_label(label.as_bytes()) {
                    Some(e) => TextEncoding::Legacy(e),
                    None => {
                        crate::common::verbose!("charset {name} has no encoding, skipped");
                        return None;
                    },
                },
            };
            Some(Charset { id, name, bytes_per_char, encoding })
        })
        .collect()
});

/// Lookup registered character set by id.
pub fn by_id(id: u8) -> Option<&'static Charset> {
    REGISTRY.iter().find(|c| c.id == id)
}

/// Lookup registered character set by case insensitive name.
pub fn by_name(name: &str) -> Option<&'static Charset> {
    REGISTRY.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

/// The default character set, `NONE`.
pub fn default() -> &'static Charset {
    &REGISTRY[0]
}

/// The `OCTETS` character set.
pub fn octets() -> &'static Charset {
    &REGISTRY[1]
}

/// Iterate all registered character sets.
pub fn all() -> impl Iterator<Item = &'static Charset> {
    REGISTRY.iter()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookup() {
        assert_eq!(default().name(), "NONE");
        assert!(octets().is_octets());
        assert_eq!(by_name("win1252").unwrap().id(), 53);
        assert_eq!(by_name("Unicode_Fss").unwrap().bytes_per_char(), 3);
        assert_eq!(by_id(4).unwrap().name(), "UTF8");
        assert!(by_name("EBCDIC").is_none());
    }

    #[test]
    fn unsupported_skipped() {
        // no single byte DOS code page is available
        assert!(by_id(10).is_none());
        assert!(all().count() < TABLE.len());
        assert!(by_id(65).is_some());
    }

    #[test]
    fn legacy_round_trip() {
        let win1251 = by_name("WIN1251").unwrap();
        let bytes = win1251.encode("привет").unwrap();
        assert_eq!(bytes.len(), 6);
        assert_eq!(win1251.decode(&bytes), "привет");
    }

    #[test]
    fn ascii_rejects() {
        let ascii = by_id(2).unwrap();
        assert!(ascii.encode("abc").is_ok());
        assert!(ascii.encode("é").is_err());
    }

    #[test]
    fn decode_at_clamped() {
        let none = default();
        assert_eq!(none.decode_at(b"hello world", 6, 5), "world");
        assert_eq!(none.decode_at(b"hello", 3, 10), "lo");
        assert_eq!(none.decode_at(b"hello", 10, 1), "");
    }
}
