use std::io::{self, Read, Write};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Line in a RECORD file.
///
/// See: <https://packaging.python.org/en/latest/specifications/recording-installed-packages/#the-record-file>
///
/// ```csv
/// foo/__init__.py,sha256=47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU,0
/// foo-1.0.0.dist-info/RECORD,,
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecordEntry {
    /// The `/`-separated path inside the archive.
    pub path: String,
    pub hash: Option<String>,
    pub size: Option<u64>,
}

impl RecordEntry {
    /// An entry without hash and size, as the RECORD file lists itself.
    pub fn unhashed(path: String) -> Self {
        Self {
            path,
            hash: None,
            size: None,
        }
    }
}

/// Copy `reader` into `writer` in 8 KiB chunks, returning the RECORD hash and the size of the
/// copied bytes.
pub(crate) fn copy_hashed(
    reader: &mut impl Read,
    writer: &mut impl Write,
) -> io::Result<(String, u64)> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut size = 0u64;
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        writer.write_all(&buffer[..n])?;
        size += n as u64;
    }
    Ok((encode_hash(hasher), size))
}

/// A reader that hashes and counts everything read through it, for writers that need to hand
/// the reader to another library.
pub(crate) struct HashingReader<R> {
    reader: R,
    hasher: Sha256,
    size: u64,
}

impl<R: Read> HashingReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            hasher: Sha256::new(),
            size: 0,
        }
    }

    /// The RECORD hash and the number of bytes read.
    pub(crate) fn finish(self) -> (String, u64) {
        (encode_hash(self.hasher), self.size)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.size += n as u64;
        Ok(n)
    }
}

/// The `sha256=<urlsafe-base64-nopad>` form used by RECORD files.
fn encode_hash(hasher: Sha256) -> String {
    format!("sha256={}", URL_SAFE_NO_PAD.encode(hasher.finalize()))
}

/// Serialize the RECORD file, terminated by the line for the RECORD file itself.
pub(crate) fn record_file(
    records: &[RecordEntry],
    record_path: &str,
) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .escape(b'"')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    writer.serialize(RecordEntry::unhashed(record_path.to_string()))?;
    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}
