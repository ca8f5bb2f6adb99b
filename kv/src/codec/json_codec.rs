//! Unframed JSON codec used for diagnostic dumps (`DEBUG JSON`) and secondary
//! store payloads small enough to skip length-prefixing.

use serde::de;

use crate::codec::Codec;
use crate::error::{CResult, Error};

#[derive(Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        JsonCodec
    }

    pub fn encode<T>(&self, value: &T) -> CResult<String>
    where
        T: ?Sized + serde::Serialize,
    {
        serde_json::to_string(value).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn decode<R>(&self, value: &str) -> CResult<R>
    where
        R: for<'a> de::Deserialize<'a>,
    {
        serde_json::from_str(value).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl Codec for JsonCodec {
    fn codec_name<T>(&self) -> String {
        "JsonCodec".to_string()
    }
}

#[cfg(test)]
mod test {
    use serde_derive::{Deserialize, Serialize};

    use crate::codec::json_codec::JsonCodec;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: i16,
    }

    #[test]
    fn round_trips_a_value() {
        let codec = JsonCodec::new();
        let p = Person { name: "ada".into(), age: 30 };
        let encoded = codec.encode(&p).unwrap();
        let decoded: Person = codec.decode(&encoded).unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn rejects_malformed_json() {
        let codec = JsonCodec::new();
        let err = codec.decode::<Person>("not json").unwrap_err();
        assert!(matches!(err, crate::error::Error::Serialization(_)));
    }
}
