//! Portable serialization of AVAs, RDNs and DNs.
//!
//! Two forms per type, both round-tripping exactly:
//!
//! 1. A length-prefixed byte layout (`write_to` / `read_from`): every
//!    string is a big-endian `u32` length followed by its bytes.
//! 2. An object-stream form (`write_stream` / `read_stream`) that prefixes
//!    the same payload with a sentinel byte, a format version and a type
//!    tag, for version tolerance.
//!
//! Buffers are owned by the caller; the library neither allocates the
//! destination nor closes anything.

use bytes::{Buf, BufMut};

use crate::ava::{AttributeBinding, Ava};
use crate::dn::Dn;
use crate::error::{Error, Result};
use crate::prep::MatchingRule;
use crate::rdn::{self, Rdn};
use crate::value::Value;

const STREAM_SENTINEL: u8 = 0xD1;
const STREAM_VERSION: u8 = 1;

const TAG_AVA: u8 = 0;
const TAG_RDN: u8 = 1;
const TAG_DN: u8 = 2;

const VALUE_TEXT: u8 = 0;
const VALUE_BINARY: u8 = 1;

const FLAG_BOUND: u8 = 0b0000_0001;

impl Ava {
    /// Write the length-prefixed layout.
    pub fn write_to(&self, buf: &mut impl BufMut) -> Result<()> {
        if self.is_incomplete() {
            return Err(Error::IncompleteAva { offset: 0 });
        }
        let mut flags = 0u8;
        if self.binding.is_some() {
            flags |= FLAG_BOUND;
        }
        buf.put_u8(flags);
        put_str(buf, &self.name)?;
        put_str(buf, &self.user_type)?;
        match &self.value {
            Value::Text(s) => {
                buf.put_u8(VALUE_TEXT);
                put_str(buf, s)?;
            }
            Value::Binary(bytes) => {
                buf.put_u8(VALUE_BINARY);
                put_bytes(buf, bytes)?;
            }
        }
        if let Some(binding) = &self.binding {
            put_str(buf, &binding.oid)?;
            buf.put_u8(binding.syntax_hr as u8);
            buf.put_u8(binding.rule.tag());
            put_str(buf, &binding.prepped)?;
        }
        Ok(())
    }

    /// Read the length-prefixed layout.
    pub fn read_from(buf: &mut impl Buf) -> Result<Self> {
        let mut reader = Reader::new(buf);
        let ava = reader.ava()?;
        Ok(ava)
    }

    /// Write the sentinel-gated object-stream form.
    pub fn write_stream(&self, buf: &mut impl BufMut) -> Result<()> {
        put_stream_header(buf, TAG_AVA);
        self.write_to(buf)
    }

    /// Read the sentinel-gated object-stream form.
    pub fn read_stream(buf: &mut impl Buf) -> Result<Self> {
        let mut reader = Reader::new(buf);
        reader.stream_header(TAG_AVA)?;
        reader.ava()
    }
}

impl Rdn {
    /// Write the length-prefixed layout.
    pub fn write_to(&self, buf: &mut impl BufMut) -> Result<()> {
        put_str(buf, &self.name)?;
        put_count(buf, self.avas.len())?;
        for ava in &self.avas {
            ava.write_to(buf)?;
        }
        Ok(())
    }

    /// Read the length-prefixed layout.
    pub fn read_from(buf: &mut impl Buf) -> Result<Self> {
        let mut reader = Reader::new(buf);
        reader.rdn()
    }

    /// Write the sentinel-gated object-stream form.
    pub fn write_stream(&self, buf: &mut impl BufMut) -> Result<()> {
        put_stream_header(buf, TAG_RDN);
        self.write_to(buf)
    }

    /// Read the sentinel-gated object-stream form.
    pub fn read_stream(buf: &mut impl Buf) -> Result<Self> {
        let mut reader = Reader::new(buf);
        reader.stream_header(TAG_RDN)?;
        reader.rdn()
    }
}

impl Dn {
    /// Write the length-prefixed layout.
    pub fn write_to(&self, buf: &mut impl BufMut) -> Result<()> {
        put_str(buf, &self.name)?;
        put_count(buf, self.rdns.len())?;
        for rdn in &self.rdns {
            rdn.write_to(buf)?;
        }
        Ok(())
    }

    /// Read the length-prefixed layout.
    pub fn read_from(buf: &mut impl Buf) -> Result<Self> {
        let mut reader = Reader::new(buf);
        reader.dn()
    }

    /// Write the sentinel-gated object-stream form.
    pub fn write_stream(&self, buf: &mut impl BufMut) -> Result<()> {
        put_stream_header(buf, TAG_DN);
        self.write_to(buf)
    }

    /// Read the sentinel-gated object-stream form.
    pub fn read_stream(buf: &mut impl Buf) -> Result<Self> {
        let mut reader = Reader::new(buf);
        reader.stream_header(TAG_DN)?;
        reader.dn()
    }
}

fn put_stream_header(buf: &mut impl BufMut, tag: u8) {
    buf.put_u8(STREAM_SENTINEL);
    buf.put_u8(STREAM_VERSION);
    buf.put_u8(tag);
}

fn put_str(buf: &mut impl BufMut, s: &str) -> Result<()> {
    put_bytes(buf, s.as_bytes())
}

fn put_bytes(buf: &mut impl BufMut, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| Error::CorruptSerialization {
        offset: 0,
        detail: "field longer than u32".to_owned(),
    })?;
    buf.put_u32(len);
    buf.put_slice(bytes);
    Ok(())
}

fn put_count(buf: &mut impl BufMut, count: usize) -> Result<()> {
    let count = u32::try_from(count).map_err(|_| Error::CorruptSerialization {
        offset: 0,
        detail: "count longer than u32".to_owned(),
    })?;
    buf.put_u32(count);
    Ok(())
}

fn corrupt_at(offset: usize, detail: &str) -> Error {
    Error::CorruptSerialization {
        offset,
        detail: detail.to_owned(),
    }
}

/// Cursor over a caller-provided buffer that tracks the byte offset for
/// error reporting.
struct Reader<'a, B: Buf> {
    buf: &'a mut B,
    read: usize,
}

impl<'a, B: Buf> Reader<'a, B> {
    fn new(buf: &'a mut B) -> Self {
        Self { buf, read: 0 }
    }

    fn corrupt(&self, detail: &str) -> Error {
        Error::CorruptSerialization {
            offset: self.read,
            detail: detail.to_owned(),
        }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::UnexpectedEof { offset: self.read });
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        self.read += 1;
        Ok(self.buf.get_u8())
    }

    fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        self.read += 4;
        Ok(self.buf.get_u32())
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        self.need(len)?;
        let mut out = vec![0u8; len];
        self.buf.copy_to_slice(&mut out);
        self.read += len;
        Ok(out)
    }

    fn string(&mut self) -> Result<String> {
        let start = self.read;
        String::from_utf8(self.bytes()?).map_err(|_| Error::CorruptSerialization {
            offset: start,
            detail: "string field is not valid UTF-8".to_owned(),
        })
    }

    fn stream_header(&mut self, expected_tag: u8) -> Result<()> {
        let at = self.read;
        if self.u8()? != STREAM_SENTINEL {
            return Err(corrupt_at(at, "bad stream sentinel"));
        }
        let at = self.read;
        if self.u8()? != STREAM_VERSION {
            return Err(corrupt_at(at, "unsupported stream version"));
        }
        let at = self.read;
        if self.u8()? != expected_tag {
            return Err(corrupt_at(at, "stream holds a different type"));
        }
        Ok(())
    }

    fn count(&mut self) -> Result<usize> {
        let count = self.u32()? as usize;
        // Every element needs at least a handful of bytes; a count beyond
        // the remaining buffer is corruption, not just truncation.
        if count > self.buf.remaining() {
            return Err(self.corrupt("element count exceeds remaining bytes"));
        }
        Ok(count)
    }

    fn ava(&mut self) -> Result<Ava> {
        let flags = self.u8()?;
        if flags & !FLAG_BOUND != 0 {
            return Err(self.corrupt("unknown AVA flags"));
        }
        let name = self.string()?;
        let user_type = self.string()?;
        let value = match self.u8()? {
            VALUE_TEXT => Value::Text(self.string()?),
            VALUE_BINARY => Value::Binary(self.bytes()?),
            _ => return Err(self.corrupt("unknown value kind")),
        };
        let binding = if flags & FLAG_BOUND != 0 {
            let oid = self.string()?;
            let syntax_hr = match self.u8()? {
                0 => false,
                1 => true,
                _ => return Err(self.corrupt("bad syntax flag")),
            };
            let rule = MatchingRule::from_tag(self.u8()?)
                .ok_or_else(|| self.corrupt("unknown matching rule tag"))?;
            let prepped = self.string()?;
            Some(AttributeBinding {
                oid,
                syntax_hr,
                rule,
                prepped,
            })
        } else {
            None
        };
        Ok(Ava {
            name,
            user_type,
            value,
            binding,
        })
    }

    fn rdn(&mut self) -> Result<Rdn> {
        let name = self.string()?;
        let count = self.count()?;
        if count == 0 {
            return Err(self.corrupt("RDN with no AVAs"));
        }
        let mut avas = Vec::with_capacity(count);
        for _ in 0..count {
            avas.push(self.ava()?);
        }
        rdn::ensure_unique(&avas)?;
        Ok(Rdn::from_parser(name, avas))
    }

    fn dn(&mut self) -> Result<Dn> {
        let name = self.string()?;
        let count = self.count()?;
        let mut rdns = Vec::with_capacity(count);
        for _ in 0..count {
            rdns.push(self.rdn()?);
        }
        Ok(Dn::from_parser(name, rdns))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use crate::ava::Ava;
    use crate::dn::Dn;
    use crate::error::Error;
    use crate::rdn::Rdn;
    use crate::schema::CoreSchema;
    use crate::value::Value;

    #[test]
    fn ava_round_trip() {
        let ava = Ava::new("cn", "Kate Bush").unwrap();
        let mut buf = Vec::new();
        ava.write_to(&mut buf).unwrap();
        let back = Ava::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, ava);
        assert_eq!(back.name(), ava.name());
    }

    #[test]
    fn bound_ava_round_trip() {
        let schema = CoreSchema;
        let ava = Ava::with_schema(&schema, "CN", "  Kate   Bush ").unwrap();
        let mut buf = Vec::new();
        ava.write_to(&mut buf).unwrap();
        let back = Ava::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, ava);
        assert_eq!(back.normalized(), "2.5.4.3=kate bush");
        assert!(back.is_schema_aware());
    }

    #[test]
    fn binary_value_round_trip() {
        let ava = Ava::new("jpegPhoto", Value::Binary(vec![0x00, 0xFF, 0x10])).unwrap();
        let mut buf = Vec::new();
        ava.write_to(&mut buf).unwrap();
        let back = Ava::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back.value().as_bytes(), &[0x00, 0xFF, 0x10]);
    }

    #[test]
    fn incomplete_ava_is_rejected() {
        let empty = Ava::default();
        let mut buf = Vec::new();
        assert_matches!(empty.write_to(&mut buf), Err(Error::IncompleteAva { offset: 0 }));
    }

    #[test]
    fn rdn_and_dn_round_trip() {
        let dn = Dn::parse("cn=Kate Bush+sn=Bush , ou=system").unwrap();
        let mut buf = Vec::new();
        dn.write_to(&mut buf).unwrap();
        let back = Dn::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, dn);
        assert_eq!(back.name(), dn.name());
        assert_eq!(back.escaped(), dn.escaped());

        let rdn = Rdn::parse("cn=a+sn=b").unwrap();
        let mut buf = Vec::new();
        rdn.write_to(&mut buf).unwrap();
        let back = Rdn::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, rdn);
        assert_eq!(back.name(), rdn.name());
    }

    #[test]
    fn stream_form_round_trip() {
        let dn = Dn::parse("cn=kate,dc=example").unwrap();
        let mut buf = Vec::new();
        dn.write_stream(&mut buf).unwrap();
        let back = Dn::read_stream(&mut buf.as_slice()).unwrap();
        assert_eq!(back, dn);
    }

    #[test]
    fn truncated_streams_fail_with_eof() {
        let dn = Dn::parse("cn=kate,dc=example").unwrap();
        let mut buf = Vec::new();
        dn.write_to(&mut buf).unwrap();
        for cut in [0, 1, 3, buf.len() / 2, buf.len() - 1] {
            let result = Dn::read_from(&mut &buf[..cut]);
            assert_matches!(
                result,
                Err(Error::UnexpectedEof { .. }) | Err(Error::CorruptSerialization { .. }),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn bad_sentinel_and_tag() {
        let dn = Dn::parse("cn=kate").unwrap();
        let mut buf = Vec::new();
        dn.write_stream(&mut buf).unwrap();

        let mut bad = buf.clone();
        bad[0] = 0x00;
        assert_matches!(
            Dn::read_stream(&mut bad.as_slice()),
            Err(Error::CorruptSerialization { offset: 0, .. })
        );

        let mut wrong_version = buf.clone();
        wrong_version[1] = 9;
        assert_matches!(
            Dn::read_stream(&mut wrong_version.as_slice()),
            Err(Error::CorruptSerialization { offset: 1, .. })
        );

        assert_matches!(
            Rdn::read_stream(&mut buf.as_slice()),
            Err(Error::CorruptSerialization { offset: 2, .. })
        );
    }

    #[test]
    fn corrupt_counts_are_detected() {
        let dn = Dn::parse("cn=kate").unwrap();
        let mut buf = Vec::new();
        dn.write_to(&mut buf).unwrap();
        // The RDN count sits right after the u32-prefixed name.
        let count_at = 4 + dn.name().len();
        buf[count_at] = 0xFF;
        assert_matches!(
            Dn::read_from(&mut buf.as_slice()),
            Err(Error::CorruptSerialization { .. })
        );
    }

    #[test]
    fn empty_dn_round_trip() {
        let dn = Dn::root();
        let mut buf = Vec::new();
        dn.write_to(&mut buf).unwrap();
        let back = Dn::read_from(&mut buf.as_slice()).unwrap();
        assert!(back.is_empty());
    }
}
