//! Web build data container (`UnityWebData1.0`).
//!
//! Little-endian directory of `(offset, length, name)` entries followed by
//! the concatenated file contents. The whole container may itself be gzip or
//! brotli wrapped; unwrapping happens before this parser sees it.

use crate::core::file_name_of;
use crate::stream::{ByteView, Endian, EndianReader};
use crate::util::{Error, Result};

use super::StreamFile;

/// Parsed web container.
#[derive(Debug)]
pub struct WebFile {
    pub signature: String,
    pub files: Vec<StreamFile>,
}

impl WebFile {
    pub fn parse(view: &ByteView) -> Result<Self> {
        let mut r = EndianReader::new(view.as_bytes(), Endian::Little);
        let signature = r.read_cstring_max(32)?;
        let head_length = r.read_i32()?;
        if head_length < 0 || head_length as usize > view.len() {
            return Err(Error::invalid(format!("web header length {head_length} out of range")));
        }
        let mut files = Vec::new();
        while r.position() < head_length as usize {
            let offset = r.read_i32()?;
            let length = r.read_i32()?;
            let name_len = r.read_count(1)?;
            let path = String::from_utf8_lossy(r.take(name_len)?).into_owned();
            if offset < 0 || length < 0 {
                return Err(Error::invalid(format!("negative extent for \"{path}\"")));
            }
            files.push(StreamFile {
                file_name: file_name_of(&path).to_string(),
                data: view.slice(offset as u64, length as u64)?,
                path,
            });
        }
        Ok(Self { signature, files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_web(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut head = b"UnityWebData1.0\0".to_vec();
        let dir_len: usize = entries.iter().map(|(n, _)| 12 + n.len()).sum();
        let head_length = head.len() + 4 + dir_len;
        head.extend_from_slice(&(head_length as i32).to_le_bytes());
        let mut offset = head_length;
        for (name, data) in entries {
            head.extend_from_slice(&(offset as i32).to_le_bytes());
            head.extend_from_slice(&(data.len() as i32).to_le_bytes());
            head.extend_from_slice(&(name.len() as i32).to_le_bytes());
            head.extend_from_slice(name.as_bytes());
            offset += data.len();
        }
        for (_, data) in entries {
            head.extend_from_slice(data);
        }
        head
    }

    #[test]
    fn test_parse_web_file() {
        let bytes = build_web(&[("data.unity3d", b"bundle"), ("Il2CppData/Metadata/global-metadata.dat", b"meta")]);
        let web = WebFile::parse(&ByteView::from_vec(bytes)).unwrap();
        assert_eq!(web.signature, "UnityWebData1.0");
        assert_eq!(web.files.len(), 2);
        assert_eq!(web.files[0].data.as_bytes(), b"bundle");
        assert_eq!(web.files[1].file_name, "global-metadata.dat");
        assert_eq!(web.files[1].data.as_bytes(), b"meta");
    }

    #[test]
    fn test_truncated_web_file() {
        let mut bytes = build_web(&[("a", b"payload")]);
        bytes.truncate(bytes.len() - 3);
        assert!(WebFile::parse(&ByteView::from_vec(bytes)).is_err());
    }
}
