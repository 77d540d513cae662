//! Data model for request records.

pub mod record;

pub use record::{Record, SEPARATOR, TIMESTAMP_FORMAT, blob_lines, decode, decode_blob, encode};
