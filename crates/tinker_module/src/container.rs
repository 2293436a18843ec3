//! Shared header framing for module images and debug data.
//!
//! Layout: 4-byte little-endian header length, bincode header, bincode body.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tinker_common::ContentHash;

use crate::error::ModuleError;
use crate::MODULE_FORMAT_VERSION;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ContainerHeader {
    pub magic: [u8; 4],
    pub format_version: u32,
    pub name: String,
    pub runtime: String,
    pub checksum: ContentHash,
}

pub(crate) fn encode<T: Serialize>(
    magic: [u8; 4],
    name: &str,
    body: &T,
) -> Result<Vec<u8>, ModuleError> {
    let body_bytes = bincode::serde::encode_to_vec(body, bincode::config::standard())
        .map_err(|e| ModuleError::Serialization {
            reason: e.to_string(),
        })?;

    let header = ContainerHeader {
        magic,
        format_version: MODULE_FORMAT_VERSION,
        name: name.to_string(),
        runtime: crate::runtime_descriptor(),
        checksum: ContentHash::from_bytes(&body_bytes),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| ModuleError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = u32::try_from(header_bytes.len()).map_err(|_| ModuleError::Serialization {
        reason: "header exceeds 4 GiB".to_string(),
    })?;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + body_bytes.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&body_bytes);
    Ok(output)
}

pub(crate) fn decode_header(
    magic: [u8; 4],
    raw: &[u8],
) -> Result<(ContainerHeader, usize), ModuleError> {
    if raw.len() < 4 {
        return Err(ModuleError::InvalidHeader {
            reason: format!("file is {} bytes, too short for a header", raw.len()),
        });
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&raw[..4]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    if raw.len() < 4 + header_len {
        return Err(ModuleError::InvalidHeader {
            reason: "truncated header".to_string(),
        });
    }

    let (header, _): (ContainerHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .map_err(|e| ModuleError::InvalidHeader {
                reason: e.to_string(),
            })?;

    if header.magic != magic {
        return Err(ModuleError::InvalidHeader {
            reason: format!(
                "bad magic {:?}, expected {:?}",
                String::from_utf8_lossy(&header.magic),
                String::from_utf8_lossy(&magic)
            ),
        });
    }
    if header.format_version != MODULE_FORMAT_VERSION {
        return Err(ModuleError::VersionMismatch {
            name: header.name,
            expected: MODULE_FORMAT_VERSION,
            actual: header.format_version,
        });
    }
    Ok((header, 4 + header_len))
}

pub(crate) fn decode<T: DeserializeOwned>(
    magic: [u8; 4],
    raw: &[u8],
) -> Result<(ContainerHeader, T), ModuleError> {
    let (header, body_start) = decode_header(magic, raw)?;
    let body = &raw[body_start..];

    let actual = ContentHash::from_bytes(body);
    if actual != header.checksum {
        return Err(ModuleError::ChecksumMismatch {
            name: header.name,
            expected: header.checksum.to_string(),
            actual: actual.to_string(),
        });
    }

    let (value, _): (T, usize) =
        bincode::serde::decode_from_slice(body, bincode::config::standard()).map_err(|e| {
            ModuleError::Serialization {
                reason: e.to_string(),
            }
        })?;
    Ok((header, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: [u8; 4] = *b"TEST";

    #[test]
    fn encode_decode_preserves_body() {
        let raw = encode(MAGIC, "probe", &vec![1u32, 2, 3]).unwrap();
        let (header, body): (ContainerHeader, Vec<u32>) = decode(MAGIC, &raw).unwrap();
        assert_eq!(header.name, "probe");
        assert_eq!(body, vec![1, 2, 3]);
    }

    #[test]
    fn wrong_magic_rejected() {
        let raw = encode(*b"OTHR", "probe", &0u8).unwrap();
        let err = decode::<u8>(MAGIC, &raw).unwrap_err();
        assert!(matches!(err, ModuleError::InvalidHeader { .. }));
    }

    #[test]
    fn corrupted_body_rejected() {
        let mut raw = encode(MAGIC, "probe", &"some body text".to_string()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let err = decode::<String>(MAGIC, &raw).unwrap_err();
        assert!(matches!(err, ModuleError::ChecksumMismatch { .. }));
    }

    #[test]
    fn too_short_rejected() {
        let err = decode::<u8>(MAGIC, &[1, 2]).unwrap_err();
        assert!(matches!(err, ModuleError::InvalidHeader { .. }));
    }
}
