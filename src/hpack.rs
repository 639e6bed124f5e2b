//! HPACK header compression (RFC 7541), wrapping `fluke-hpack` with the
//! duplicate-header join rules the engine requires on decode (spec §4.5):
//! repeated `cookie` fields are joined with `"; "`, every other repeated
//! field name is joined with `", "`. The dynamic table lives inside the
//! wrapped decoder/encoder and is per-connection, per-direction state.

use std::collections::HashMap;

use crate::error::ConnectionError;

/// A single decoded header field, name and value already UTF-8 (lossily,
/// since HPACK itself places no charset constraint on octet strings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Header {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Per-connection HPACK decoder. One instance per direction; the caller is
/// responsible for feeding it the fully-reassembled header block (HEADERS
/// fragment plus any CONTINUATION fragments).
pub struct Decoder {
    inner: fluke_hpack::Decoder<'static>,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder").finish()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Decoder {
            inner: fluke_hpack::Decoder::new(),
        }
    }

    pub fn with_max_table_size(max_size: usize) -> Self {
        let mut inner = fluke_hpack::Decoder::new();
        inner.set_max_table_size(max_size);
        Decoder { inner }
    }

    /// Decode a complete header block, joining duplicate names per spec
    /// §4.5. A malformed block is a connection error (spec §7): HPACK state
    /// is shared across the whole connection, so a failed decode leaves the
    /// dynamic table in an indeterminate state and nothing past it can be
    /// trusted.
    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<Header>, ConnectionError> {
        let pairs = self
            .inner
            .decode(block)
            .map_err(|e| ConnectionError::compression(format!("HPACK decode error: {e:?}")))?;

        let mut order: Vec<String> = Vec::new();
        let mut joined: HashMap<String, String> = HashMap::new();

        for (name, value) in pairs {
            let name = String::from_utf8_lossy(&name).into_owned();
            let value = String::from_utf8_lossy(&value).into_owned();

            match joined.get_mut(&name) {
                Some(existing) => {
                    let sep = if name == "cookie" { "; " } else { ", " };
                    existing.push_str(sep);
                    existing.push_str(&value);
                }
                None => {
                    order.push(name.clone());
                    joined.insert(name, value);
                }
            }
        }

        Ok(order
            .into_iter()
            .map(|name| {
                let value = joined.remove(&name).expect("name pushed with its value");
                Header::new(name, value)
            })
            .collect())
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-connection HPACK encoder.
pub struct Encoder {
    inner: fluke_hpack::Encoder<'static>,
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder").finish()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Encoder {
            inner: fluke_hpack::Encoder::new(),
        }
    }

    /// Encode `headers` into a single HPACK block. The caller is
    /// responsible for splitting the result across HEADERS/CONTINUATION
    /// frames (see `frame::Headers::encode`).
    ///
    /// `set-cookie` is never joined on the way in (each call site is
    /// expected to pass one `Header` per cookie value, per spec §8), so no
    /// special-casing is needed here: this simply encodes whatever fields
    /// it is given, in order.
    pub fn encode(&mut self, headers: &[Header]) -> Vec<u8> {
        let pairs: Vec<(&[u8], &[u8])> = headers
            .iter()
            .map(|h| (h.name.as_bytes(), h.value.as_bytes()))
            .collect();
        self.inner.encode(pairs)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_cookie_joins_with_semicolon() {
        let mut enc = Encoder::new();
        let block = enc.encode(&[
            Header::new("cookie", "a=1"),
            Header::new("cookie", "b=2"),
        ]);

        let mut dec = Decoder::new();
        let headers = dec.decode(&block).unwrap();
        assert_eq!(headers, vec![Header::new("cookie", "a=1; b=2")]);
    }

    #[test]
    fn duplicate_other_header_joins_with_comma() {
        let mut enc = Encoder::new();
        let block = enc.encode(&[
            Header::new("x-forwarded-for", "1.1.1.1"),
            Header::new("x-forwarded-for", "2.2.2.2"),
        ]);

        let mut dec = Decoder::new();
        let headers = dec.decode(&block).unwrap();
        assert_eq!(
            headers,
            vec![Header::new("x-forwarded-for", "1.1.1.1, 2.2.2.2")]
        );
    }

    #[test]
    fn preserves_first_occurrence_order() {
        let mut enc = Encoder::new();
        let block = enc.encode(&[
            Header::new(":method", "GET"),
            Header::new(":path", "/"),
            Header::new("accept", "*/*"),
        ]);

        let mut dec = Decoder::new();
        let headers = dec.decode(&block).unwrap();
        let names: Vec<&str> = headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec![":method", ":path", "accept"]);
    }
}
