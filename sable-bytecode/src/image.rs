// sable-bytecode - Bytecode format for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Binary image format for compiled executables.
//!
//! Layout: the magic bytes `SBLX`, a big-endian `u16` format version, then
//! the bincode-serialised list of executables.

use crate::error::{BytecodeError, Result};
use crate::executable::Executable;

/// Magic bytes at the start of every image.
pub const IMAGE_MAGIC: [u8; 4] = *b"SBLX";

/// Current image format version.
pub const IMAGE_VERSION: u16 = 1;

const HEADER_LEN: usize = IMAGE_MAGIC.len() + 2;

/// Serialise a batch of executables into an image.
pub fn encode_image(units: &[Executable]) -> Result<Vec<u8>> {
    let body = bincode::serialize(units).map_err(|e| BytecodeError::Image(e.to_string()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&IMAGE_MAGIC);
    out.extend_from_slice(&IMAGE_VERSION.to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse an image back into its executables.
pub fn decode_image(bytes: &[u8]) -> Result<Vec<Executable>> {
    if bytes.len() < HEADER_LEN || bytes[..IMAGE_MAGIC.len()] != IMAGE_MAGIC {
        return Err(BytecodeError::BadMagic);
    }

    let version = u16::from_be_bytes([bytes[4], bytes[5]]);
    if version != IMAGE_VERSION {
        return Err(BytecodeError::UnsupportedVersion(version));
    }

    bincode::deserialize(&bytes[HEADER_LEN..]).map_err(|e| BytecodeError::Image(e.to_string()))
}
