//! HTTP header map shared by [`Request`](crate::http::request::Request) and
//! the [`ResponseWriter`](crate::http::response::ResponseWriter).
//!
//! Names are matched case-insensitively. Entries are kept in insertion
//! order so a header block always serializes the same way.
//!
//! Setting a name that is already present never overwrites it: the new
//! value is appended to the old one with `", "`, which is how HTTP combines
//! repeated fields. Use [`HeaderMap::replace`] to override instead.
//!
//! Header lines coming off the wire go through [`HeaderMap::parse_one`],
//! which is the only place names are syntax-checked. Parsed names are
//! stored lower-cased.

use indexmap::IndexMap;
use thiserror::Error;

use crate::http::CRLF;

/// Characters allowed in a header name besides ASCII letters and digits.
const TOKEN_SPECIALS: &[u8] = b"!#$%&'*+-.^_`|~";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("malformed header: {0}")]
    MalformedHeader(String),
}

impl HeaderError {
    fn malformed<S: ToString>(reason: S) -> Self {
        Self::MalformedHeader(reason.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    // lower-cased name -> (name as first inserted, value)
    entries: IndexMap<String, (String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self { entries: IndexMap::new() }
    }

    /// Parses at most one header line from the front of `data`.
    ///
    /// Returns the number of bytes consumed and whether the blank line
    /// ending the header block was reached. `(0, false)` means no full line
    /// is buffered yet and the caller must retry with more bytes.
    pub fn parse_one(&mut self, data: &[u8]) -> Result<(usize, bool), HeaderError> {
        let Some(idx) = find_crlf(data) else {
            return Ok((0, false));
        };
        if idx == 0 {
            return Ok((CRLF.len(), true));
        }

        // Only the name is syntax-checked; the value is kept byte for byte
        // apart from invalid UTF-8 being replaced.
        let line = &data[..idx];
        let Some(colon) = line.iter().position(|b| *b == b':') else {
            return Err(HeaderError::malformed(format!(
                "missing colon in {:?}",
                String::from_utf8_lossy(line)
            )));
        };
        let (raw_name, raw_value) = (&line[..colon], &line[colon + 1..]);

        if raw_name.trim_ascii_end().len() != raw_name.len() {
            return Err(HeaderError::malformed(format!(
                "whitespace before colon in {:?}",
                String::from_utf8_lossy(raw_name)
            )));
        }
        let name = raw_name.trim_ascii_start();
        if name.is_empty() {
            return Err(HeaderError::malformed("empty header name"));
        }
        if let Some(c) = name.iter().find(|b| !is_token_byte(**b)) {
            return Err(HeaderError::malformed(format!(
                "invalid byte 0x{c:02X} in header name {:?}",
                String::from_utf8_lossy(name)
            )));
        }

        let name: String = name.iter().map(|b| b.to_ascii_lowercase() as char).collect();
        let value = String::from_utf8_lossy(raw_value.trim_ascii());
        self.set(&name, &value);
        Ok((idx + CRLF.len(), false))
    }

    /// Adds a field, folding into the existing value on duplicate names.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.entries.get_mut(&name.to_ascii_lowercase()) {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => {
                self.entries.insert(
                    name.to_ascii_lowercase(),
                    (name.to_string(), value.to_string()),
                );
            }
        }
    }

    /// Sets a field, discarding any previous value.
    pub fn replace(&mut self, name: &str, value: &str) {
        match self.entries.get_mut(&name.to_ascii_lowercase()) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.set(name, value),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .shift_remove(&name.to_ascii_lowercase())
            .map(|(_, value)| value)
    }

    /// Case-insensitive lookup. `None` when the field is absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes every field as `name: value\r\n`, without the blank line.
    pub fn stringify(&self) -> String {
        let mut result = String::new();
        for (name, value) in self.iter() {
            result.push_str(&format!("{}: {}\r\n", name, value));
        }
        result
    }
}

pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|w| w == CRLF)
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || TOKEN_SPECIALS.contains(&b)
}
