//! Value compression for table entries

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{HostKvError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
    Snappy = 1,
    Zlib = 2,
}

impl TryFrom<u8> for CompressionType {
    type Error = HostKvError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Snappy),
            2 => Ok(CompressionType::Zlib),
            _ => Err(HostKvError::Corruption(format!(
                "Invalid compression type: {}",
                value
            ))),
        }
    }
}

pub fn compress(data: &[u8], compression: CompressionType) -> Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Snappy => snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| HostKvError::InvalidArgument(format!("Snappy compression failed: {}", e))),
        CompressionType::Zlib => {
            let mut encoder =
                ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
    }
}

pub fn decompress(data: &[u8], compression: CompressionType) -> Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Snappy => snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| HostKvError::Corruption(format!("Snappy decompression failed: {}", e))),
        CompressionType::Zlib => {
            let mut out = Vec::with_capacity(data.len() * 2);
            ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| HostKvError::Corruption(format!("Zlib decompression failed: {}", e)))?;
            Ok(out)
        }
    }
}
