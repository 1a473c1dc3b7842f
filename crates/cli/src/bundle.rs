//! Resource bundle reader (§6): an executable with zero or more
//! LZ4-compressed resources appended after it, closed off with a trailer.
//!
//! Layout, from the start of the appended region:
//! `[resource]* [total-size: u64be] [magic: u64be]`, where each
//! `resource` is
//! `[path-len: u64be][path][compressed-len: u64be][original-len: u64be][payload]`.
//! `total-size` covers every resource entry but excludes the 16-byte
//! trailer itself.

use std::io::{Cursor, Read};

/// Trailer magic identifying a loom bundle (§6).
pub const BUNDLE_MAGIC: u64 = 0x12F91C8E_3D1F62C2;

const TRAILER_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct Resource {
    pub path: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub enum BundleError {
    NoBundle,
    Truncated,
    Lz4(lz4_flex::block::DecompressError),
    Utf8(std::string::FromUtf8Error),
}

impl std::fmt::Display for BundleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BundleError::NoBundle => write!(f, "no bundle trailer found"),
            BundleError::Truncated => write!(f, "bundle truncated"),
            BundleError::Lz4(e) => write!(f, "lz4 decompress failed: {e}"),
            BundleError::Utf8(e) => write!(f, "resource path is not valid utf-8: {e}"),
        }
    }
}

impl std::error::Error for BundleError {}

impl From<lz4_flex::block::DecompressError> for BundleError {
    fn from(e: lz4_flex::block::DecompressError) -> Self {
        BundleError::Lz4(e)
    }
}

impl From<std::string::FromUtf8Error> for BundleError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        BundleError::Utf8(e)
    }
}

type Result<T> = std::result::Result<T, BundleError>;

/// Returns `true` if `bytes` ends with the bundle magic.
pub fn has_bundle(bytes: &[u8]) -> bool {
    bytes.len() >= TRAILER_LEN && read_trailer(bytes).map(|(_, magic)| magic == BUNDLE_MAGIC).unwrap_or(false)
}

fn read_trailer(bytes: &[u8]) -> Option<(u64, u64)> {
    let tail = bytes.get(bytes.len() - TRAILER_LEN..)?;
    let size = u64::from_be_bytes(tail[0..8].try_into().ok()?);
    let magic = u64::from_be_bytes(tail[8..16].try_into().ok()?);
    Some((size, magic))
}

/// Reads every resource out of a bundled executable's bytes. Returns an
/// empty vector if `bytes` carries no trailer at all.
pub fn read_resources(bytes: &[u8]) -> Result<Vec<Resource>> {
    if bytes.len() < TRAILER_LEN {
        return Ok(Vec::new());
    }
    let (total_size, magic) = read_trailer(bytes).ok_or(BundleError::Truncated)?;
    if magic != BUNDLE_MAGIC {
        return Ok(Vec::new());
    }
    let region_end = bytes.len() - TRAILER_LEN;
    let region_start = region_end
        .checked_sub(total_size as usize)
        .ok_or(BundleError::Truncated)?;
    let mut cursor = Cursor::new(&bytes[region_start..region_end]);

    let mut resources = Vec::new();
    while (cursor.position() as usize) < cursor.get_ref().len() {
        resources.push(read_one(&mut cursor)?);
    }
    Ok(resources)
}

fn read_one(cursor: &mut Cursor<&[u8]>) -> Result<Resource> {
    let path_len = read_u64(cursor)? as usize;
    let mut path_bytes = vec![0u8; path_len];
    cursor.read_exact(&mut path_bytes).map_err(|_| BundleError::Truncated)?;
    let path = String::from_utf8(path_bytes)?;

    let compressed_len = read_u64(cursor)? as usize;
    let original_len = read_u64(cursor)? as usize;
    let mut payload = vec![0u8; compressed_len];
    cursor.read_exact(&mut payload).map_err(|_| BundleError::Truncated)?;

    let data = lz4_flex::block::decompress(&payload, original_len)?;
    Ok(Resource { path, data })
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64> {
    let mut buf = [0u8; 8];
    cursor.read_exact(&mut buf).map_err(|_| BundleError::Truncated)?;
    Ok(u64::from_be_bytes(buf))
}

/// Appends `resources` to `executable`, producing the bytes of a bundled
/// binary ready to write to disk.
pub fn write_bundle(executable: &[u8], resources: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut out = executable.to_vec();
    let region_start = out.len();

    for (path, data) in resources {
        let compressed = lz4_flex::block::compress(data);
        out.extend_from_slice(&(path.len() as u64).to_be_bytes());
        out.extend_from_slice(path.as_bytes());
        out.extend_from_slice(&(compressed.len() as u64).to_be_bytes());
        out.extend_from_slice(&(data.len() as u64).to_be_bytes());
        out.extend_from_slice(&compressed);
    }

    let total_size = (out.len() - region_start) as u64;
    out.extend_from_slice(&total_size.to_be_bytes());
    out.extend_from_slice(&BUNDLE_MAGIC.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_resource() {
        let exe = b"#!fake-executable-bytes".to_vec();
        let bundled = write_bundle(&exe, &[("data/fact.loom".to_string(), b"push int 6".to_vec())]);

        assert!(has_bundle(&bundled));
        let resources = read_resources(&bundled).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].path, "data/fact.loom");
        assert_eq!(resources[0].data, b"push int 6");
    }

    #[test]
    fn round_trips_multiple_resources() {
        let exe = b"exe".to_vec();
        let bundled = write_bundle(
            &exe,
            &[
                ("a.loom".to_string(), vec![1, 2, 3, 4, 5]),
                ("b.loom".to_string(), b"second resource, a bit longer this time".to_vec()),
            ],
        );
        let resources = read_resources(&bundled).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].path, "a.loom");
        assert_eq!(resources[1].data, b"second resource, a bit longer this time");
    }

    #[test]
    fn plain_executable_has_no_bundle() {
        let exe = b"just a binary, no trailer".to_vec();
        assert!(!has_bundle(&exe));
        assert!(read_resources(&exe).unwrap().is_empty());
    }
}
