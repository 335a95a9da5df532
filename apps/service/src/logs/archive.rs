//! Archive encoding: gzip, then base64 so archives stay plain text files.

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use std::io::{self, Read, Write};

use super::AuditLogError;

/// Compress `data` and encode it as base64 text
pub fn encode_archive(data: &[u8]) -> io::Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    Ok(STANDARD.encode(compressed))
}

/// Reverse [`encode_archive`]
pub fn decode_archive(text: &str) -> Result<Vec<u8>, AuditLogError> {
    let compressed = STANDARD.decode(text.trim())?;
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;
    Ok(data)
}
