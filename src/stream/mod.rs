//! Byte payload helpers shared by the filesystem and storage layers

mod converter;
mod pass_through;

pub use converter::{
    ByteStream, Data, Encoding, decode_bytes, encode_text, get_data_size, normalize_data,
    stream_to_buffer, stream_to_string, to_readable_stream,
};
pub use pass_through::{PassThroughCompletion, PassThroughStream, create_pass_through_stream};
