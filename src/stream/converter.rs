use std::fmt;
use std::io;
use std::pin::Pin;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::{Bytes, BytesMut};
use tokio_stream::{Stream, StreamExt};

/// Sequential byte source, consumed at most once
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
    Base64,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Utf8 => "utf8",
            Encoding::Latin1 => "latin1",
            Encoding::Base64 => "base64",
        };
        f.write_str(name)
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "latin1" | "binary" => Ok(Encoding::Latin1),
            "base64" => Ok(Encoding::Base64),
            other => Err(format!("Unknown encoding: {}", other)),
        }
    }
}

/// Payload accepted by write operations
pub enum Data {
    Text(String),
    Buffer(Bytes),
    Raw(Vec<u8>),
    Stream(ByteStream),
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Data::Buffer(buffer) => f.debug_tuple("Buffer").field(buffer).finish(),
            Data::Raw(raw) => f.debug_tuple("Raw").field(&raw.len()).finish(),
            Data::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<String> for Data {
    fn from(text: String) -> Self {
        Data::Text(text)
    }
}

impl From<&str> for Data {
    fn from(text: &str) -> Self {
        Data::Text(text.to_string())
    }
}

impl From<Bytes> for Data {
    fn from(buffer: Bytes) -> Self {
        Data::Buffer(buffer)
    }
}

impl From<Vec<u8>> for Data {
    fn from(raw: Vec<u8>) -> Self {
        Data::Raw(raw)
    }
}

impl From<&[u8]> for Data {
    fn from(raw: &[u8]) -> Self {
        Data::Buffer(Bytes::copy_from_slice(raw))
    }
}

impl From<ByteStream> for Data {
    fn from(stream: ByteStream) -> Self {
        Data::Stream(stream)
    }
}

/// Encode `text` into bytes. Latin-1 keeps the low byte of each char.
pub fn encode_text(text: &str, encoding: Encoding) -> io::Result<Bytes> {
    match encoding {
        Encoding::Utf8 => Ok(Bytes::copy_from_slice(text.as_bytes())),
        Encoding::Latin1 => Ok(text.chars().map(|c| c as u32 as u8).collect::<Vec<u8>>().into()),
        Encoding::Base64 => STANDARD
            .decode(text.trim())
            .map(Bytes::from)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        Encoding::Base64 => STANDARD.encode(bytes),
    }
}

/// Wrap an in-memory payload as a single-chunk stream. Streams pass through.
pub fn to_readable_stream(data: Data) -> ByteStream {
    let bytes = match data {
        Data::Stream(stream) => return stream,
        Data::Text(text) => Bytes::from(text),
        Data::Buffer(buffer) => buffer,
        Data::Raw(raw) => Bytes::from(raw),
    };
    Box::pin(tokio_stream::once(Ok(bytes)))
}

/// Concatenate every chunk of `stream`. The first failure is returned as is.
pub async fn stream_to_buffer(mut stream: ByteStream) -> io::Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}

pub async fn stream_to_string(stream: ByteStream, encoding: Encoding) -> io::Result<String> {
    let buffer = stream_to_buffer(stream).await?;
    Ok(decode_bytes(&buffer, encoding))
}

/// Exact byte length of an in-memory payload, `None` for streams
pub fn get_data_size(data: &Data) -> Option<u64> {
    match data {
        Data::Text(text) => Some(text.len() as u64),
        Data::Buffer(buffer) => Some(buffer.len() as u64),
        Data::Raw(raw) => Some(raw.len() as u64),
        Data::Stream(_) => None,
    }
}

pub async fn normalize_data(data: Option<Data>) -> io::Result<Bytes> {
    match data {
        None => Ok(Bytes::new()),
        Some(Data::Buffer(buffer)) => Ok(buffer),
        Some(Data::Text(text)) => Ok(Bytes::from(text)),
        Some(Data::Raw(raw)) => Ok(Bytes::from(raw)),
        Some(Data::Stream(stream)) => stream_to_buffer(stream).await,
    }
}
