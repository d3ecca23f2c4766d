//! Query settings in the string-serialized format
//!
//! On the wire a setting list is a run of `{key}{important}{value}` triples
//! closed by a single empty key. Encoding one setting never writes the
//! terminator; whoever writes the list does.

use bytes::Buf;
use chwire_core::{Result, ResultExt};
use serde::{Deserialize, Serialize};

use super::codecs::{Buffer, Encode, Reader};

/// One `key = value` query setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    /// The server must reject the query if it does not know this setting.
    pub important: bool,
}

impl Setting {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into(), important: false }
    }

    pub fn important(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into(), important: true }
    }

    /// Decode one setting, or `None` on the end-of-list sentinel.
    ///
    /// Consumes at most one key/important/value triple; after the sentinel only
    /// the empty key has been read.
    pub fn decode<B: Buf>(r: &mut Reader<B>) -> Result<Option<Self>> {
        let key = r.string().field("key")?;
        if key.is_empty() {
            return Ok(None);
        }
        let important = r.bool().field("important")?;
        let value = r.string().field("value")?;

        Ok(Some(Self { key, value, important }))
    }

    /// Write the empty key that closes a setting list.
    pub fn encode_terminator(buf: &mut Buffer) {
        buf.put_string("");
    }
}

impl Encode for Setting {
    fn encode(&self, buf: &mut Buffer) {
        buf.put_string(&self.key);
        buf.put_bool(self.important);
        buf.put_string(&self.value);
    }
}

/// Write every setting in order followed by the terminator.
pub fn encode_settings(buf: &mut Buffer, settings: &[Setting]) {
    for s in settings {
        buf.put(s);
    }
    Setting::encode_terminator(buf);
}

/// Read settings up to and including the terminator.
pub fn decode_settings<B: Buf>(r: &mut Reader<B>) -> Result<Vec<Setting>> {
    let mut settings = Vec::new();
    while let Some(s) = Setting::decode(r)? {
        settings.push(s);
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_layout() {
        let mut buf = Buffer::new();
        buf.put(&Setting::important("a", "1"));
        assert_eq!(buf.as_slice(), &[1, b'a', 1, 1, b'1']);
    }

    #[test]
    fn test_empty_key_is_sentinel() {
        let bytes = [0, 0xAA];
        let mut r = Reader::new(&bytes[..]);
        assert_eq!(Setting::decode(&mut r).unwrap(), None);
        // Nothing past the empty key is consumed.
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn test_list_roundtrip_keeps_order() {
        let settings = vec![
            Setting::new("max_threads", "4"),
            Setting::important("readonly", "1"),
            Setting::new("log_comment", ""),
        ];

        let mut buf = Buffer::new();
        encode_settings(&mut buf, &settings);
        let mut r = Reader::new(buf.as_slice());
        assert_eq!(decode_settings(&mut r).unwrap(), settings);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_empty_list_is_single_sentinel() {
        let mut buf = Buffer::new();
        encode_settings(&mut buf, &[]);
        assert_eq!(buf.as_slice(), &[0]);
    }

    #[test]
    fn test_truncated_value_names_field() {
        let mut buf = Buffer::new();
        buf.put_string("key");
        buf.put_bool(false);
        let err = Setting::decode(&mut Reader::new(buf.as_slice())).unwrap_err();
        assert!(err.is_short_read());
        assert_eq!(err.path(), &["value"]);
    }
}
