//! Container signatures and kind detection.

use byteorder::{BigEndian, ByteOrder};

/// Bundle signatures, null-terminated at offset 0.
pub const SIGNATURE_UNITY_FS: &str = "UnityFS";
pub const SIGNATURE_UNITY_WEB: &str = "UnityWeb";
pub const SIGNATURE_UNITY_RAW: &str = "UnityRaw";
pub const SIGNATURE_UNITY_ARCHIVE: &str = "UnityArchive";

/// Web container signatures.
pub const SIGNATURE_WEB_DATA: &str = "UnityWebData1.0";
pub const SIGNATURE_TUANJIE_WEB_DATA: &str = "TuanjieWebData1.0";

/// Gzip member header.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Marker written by the web build pipeline into brotli-compressed files.
pub const BROTLI_MAGIC: &[u8; 6] = b"brotli";

/// Offset of [`BROTLI_MAGIC`].
pub const BROTLI_MAGIC_OFFSET: usize = 0x20;

/// Zip local file header and spanned-archive marker.
pub const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
pub const ZIP_SPANNED_MAGIC: [u8; 4] = [0x50, 0x4B, 0x07, 0x08];

/// Longest signature looked at during detection.
pub const MAX_SIGNATURE_LEN: usize = 20;

/// Serialized-file format version that widened header fields to 64 bits.
pub const LARGE_HEADER_VERSION: u32 = 22;

/// Kind of container held by a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    AssetsFile,
    BundleFile,
    WebFile,
    ResourceFile,
    GZipFile,
    BrotliFile,
    ZipFile,
}

/// Leading null-terminated signature, at most [`MAX_SIGNATURE_LEN`] bytes.
pub fn read_signature(data: &[u8]) -> &str {
    let head = &data[..data.len().min(MAX_SIGNATURE_LEN)];
    let end = head.iter().position(|&b| b == 0).unwrap_or(head.len());
    std::str::from_utf8(&head[..end]).unwrap_or("")
}

/// True if `signature` names a bundle container.
#[inline]
pub fn is_bundle_signature(signature: &str) -> bool {
    matches!(
        signature,
        SIGNATURE_UNITY_FS | SIGNATURE_UNITY_WEB | SIGNATURE_UNITY_RAW | SIGNATURE_UNITY_ARCHIVE
    )
}

/// Detect the container kind of `data`.
pub fn detect(data: &[u8]) -> FileType {
    let signature = read_signature(data);
    if is_bundle_signature(signature) {
        return FileType::BundleFile;
    }
    if matches!(signature, SIGNATURE_WEB_DATA | SIGNATURE_TUANJIE_WEB_DATA) {
        return FileType::WebFile;
    }
    if data.starts_with(&GZIP_MAGIC) {
        return FileType::GZipFile;
    }
    if data.len() >= BROTLI_MAGIC_OFFSET + BROTLI_MAGIC.len()
        && &data[BROTLI_MAGIC_OFFSET..BROTLI_MAGIC_OFFSET + BROTLI_MAGIC.len()] == BROTLI_MAGIC
    {
        return FileType::BrotliFile;
    }
    if is_serialized_file(data) {
        return FileType::AssetsFile;
    }
    if data.starts_with(&ZIP_MAGIC) || data.starts_with(&ZIP_SPANNED_MAGIC) {
        return FileType::ZipFile;
    }
    FileType::ResourceFile
}

/// Header sanity check for serialized files: the declared file size must
/// match the stream and the data offset must lie inside it.
pub fn is_serialized_file(data: &[u8]) -> bool {
    let len = data.len() as u64;
    if len < 20 {
        return false;
    }
    let mut file_size = BigEndian::read_u32(&data[4..8]) as u64;
    let version = BigEndian::read_u32(&data[8..12]);
    let mut data_offset = BigEndian::read_u32(&data[12..16]) as u64;
    if version >= LARGE_HEADER_VERSION {
        if len < 48 {
            return false;
        }
        file_size = BigEndian::read_i64(&data[24..32]) as u64;
        data_offset = BigEndian::read_i64(&data[32..40]) as u64;
    }
    file_size == len && data_offset <= len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_serialized(version: u32, len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        BigEndian::write_u32(&mut data[8..12], version);
        if version >= LARGE_HEADER_VERSION {
            BigEndian::write_i64(&mut data[24..32], len as i64);
            BigEndian::write_i64(&mut data[32..40], 48);
        } else {
            BigEndian::write_u32(&mut data[4..8], len as u32);
            BigEndian::write_u32(&mut data[12..16], 32);
        }
        data
    }

    #[test]
    fn test_detect_signatures() {
        assert_eq!(detect(b"UnityFS\0\0\0\0\x08"), FileType::BundleFile);
        assert_eq!(detect(b"UnityRaw\0"), FileType::BundleFile);
        assert_eq!(detect(b"UnityWebData1.0\0xxxx"), FileType::WebFile);
        assert_eq!(detect(&[0x1F, 0x8B, 8, 0]), FileType::GZipFile);
        assert_eq!(detect(&[0x50, 0x4B, 0x03, 0x04, 0, 0]), FileType::ZipFile);
        assert_eq!(detect(b"just some resource bytes here"), FileType::ResourceFile);

        let mut brotli = vec![1u8; 0x40];
        brotli[0x20..0x26].copy_from_slice(BROTLI_MAGIC);
        assert_eq!(detect(&brotli), FileType::BrotliFile);
    }

    #[test]
    fn test_detect_serialized() {
        assert_eq!(detect(&fake_serialized(17, 64)), FileType::AssetsFile);
        assert_eq!(detect(&fake_serialized(22, 64)), FileType::AssetsFile);

        let mut wrong_size = fake_serialized(17, 64);
        wrong_size.push(0);
        assert_eq!(detect(&wrong_size), FileType::ResourceFile);
        assert!(!is_serialized_file(&[0u8; 10]));
    }
}
