//! Length-prefixed JSON framing for the secondary-store bridge (spec §4.5).
//! Values cross the bridge as `u64` big-endian length + JSON body, the same
//! framing the teacher used for its on-disk log format.

use std::io::{Cursor, Read};

use byteorder::ReadBytesExt;
use bytes::{BufMut, BytesMut};
use serde::Deserialize;

use crate::codec::Codec;
use crate::error::{CResult, Error};

#[derive(Clone, Copy, Default)]
pub struct BytesCodec;

impl BytesCodec {
    pub fn new() -> Self {
        BytesCodec
    }

    pub fn encode<T>(&self, value: &T) -> CResult<Vec<u8>>
    where
        T: ?Sized + serde::Serialize,
    {
        let encoded = serde_json::to_string(value).map_err(|e| Error::Serialization(e.to_string()))?;
        let bytes = encoded.as_bytes();
        let mut buf = BytesMut::with_capacity(8 + bytes.len());
        buf.put_u64(bytes.len() as u64);
        buf.put(bytes);
        Ok(buf.to_vec())
    }

    pub fn decode_bytes<R>(&self, value: &[u8], decode_len: bool) -> CResult<R>
    where
        R: for<'a> Deserialize<'a>,
    {
        let bytes = if decode_len {
            let mut cursor = Cursor::new(value);
            let len = cursor
                .read_u64::<byteorder::BigEndian>()
                .map_err(|e| Error::Serialization(e.to_string()))? as usize;
            let mut b = vec![0; len];
            cursor.read_exact(&mut b).map_err(|e| Error::Serialization(e.to_string()))?;
            b
        } else {
            value.to_vec()
        };

        let s = String::from_utf8(bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        serde_json::from_str(&s).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn decode_cursor<R>(&self, cursor: &mut Cursor<&[u8]>) -> CResult<Option<R>>
    where
        R: for<'a> Deserialize<'a>,
    {
        if cursor.position() >= cursor.get_ref().len() as u64 {
            return Ok(None);
        }

        let len = cursor
            .read_u64::<byteorder::BigEndian>()
            .map_err(|e| Error::Serialization(e.to_string()))? as usize;
        let mut by = vec![0; len];
        cursor.read_exact(&mut by).map_err(|e| Error::Serialization(e.to_string()))?;

        self.decode_bytes(by.as_slice(), false).map(Some)
    }
}

impl Codec for BytesCodec {
    fn codec_name<T>(&self) -> String {
        "BytesCodec".to_string()
    }
}

#[cfg(test)]
mod test {
    use bytes::{BufMut, BytesMut};
    use serde_derive::{Deserialize, Serialize};
    use std::io::Cursor;

    use crate::codec::bytes_codec::BytesCodec;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: i16,
    }

    #[test]
    fn round_trips_through_length_prefixed_frames() {
        let codec = BytesCodec::new();
        let people: Vec<Person> =
            (0..16).map(|i| Person { name: format!("name{i}"), age: i }).collect();

        let mut buf = BytesMut::new();
        for p in &people {
            buf.put(codec.encode(p).unwrap().as_slice());
        }

        let mut cursor = Cursor::new(buf.as_ref());
        let mut decoded = Vec::new();
        while let Some(p) = codec.decode_cursor::<Person>(&mut cursor).unwrap() {
            decoded.push(p);
        }
        assert_eq!(decoded, people);
    }
}
