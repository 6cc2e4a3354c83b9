/// Errors that can occur while encoding or decoding inference results.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A packed float buffer's length is not a multiple of 4.
    #[error("malformed float buffer for {key}: {len} bytes is not a multiple of 4")]
    MalformedBuffer { key: String, len: usize },

    /// A reserved key carries a value of the wrong type.
    #[error("unexpected value for {key}: expected {expected}")]
    UnexpectedType { key: String, expected: &'static str },

    /// The message root is not a map.
    #[error("message root is not a map")]
    NotAMap,

    /// A map key is not a UTF-8 string.
    #[error("map key is not a string: {0}")]
    NonStringKey(String),

    /// Bytes remain after the root map.
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    /// The MessagePack payload could not be parsed.
    #[error("msgpack decode error: {0}")]
    Decode(#[from] rmpv::decode::Error),

    /// The MessagePack payload could not be written.
    #[error("msgpack encode error: {0}")]
    Encode(#[from] rmpv::encode::Error),

    /// A JSON document could not be converted.
    #[error("json conversion error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
