//! Append-only vector file.
//!
//! Each record is framed as `[u32 length BE][u32 CRC32 BE][bincode payload]`
//! where the payload is a [`StoredVector`]. The offset returned by
//! [`write`](crate::storage::VectorStore::write) is the byte position of the
//! frame header. Writers are serialized with a `parking_lot::Mutex`; readers
//! open their own handle and never block writers.

use crate::config;
use crate::storage::VectorStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const FRAME_HEADER_LEN: u64 = 8;

/// Largest payload a record can have: bincode `u64` id, `u64` length prefix
/// and up to `MAX_DIMENSION` `f32` components.
const MAX_RECORD_LEN: usize = 16 + 4 * config::MAX_DIMENSION;

/// A record as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVector {
    pub id: u64,
    pub vector: Vec<f32>,
}

/// Borrowing twin of [`StoredVector`]; bincode encodes both identically.
#[derive(Serialize)]
struct StoredVectorRef<'a> {
    id: u64,
    vector: &'a [f32],
}

struct Appender {
    writer: BufWriter<File>,
    next_offset: u64,
}

/// File-backed [`VectorStore`] with CRC32 integrity checks.
pub struct FileVectorStore {
    appender: Mutex<Appender>,
    path: PathBuf,
}

impl FileVectorStore {
    /// Open or create the vector file at `path` in append mode.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut opts = OpenOptions::new();
        opts.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let file = opts.open(&path)?;
        let next_offset = file.metadata()?.len();
        tracing::info!(path = %path.display(), bytes = next_offset, "vector store opened");

        Ok(Self {
            appender: Mutex::new(Appender {
                writer: BufWriter::new(file),
                next_offset,
            }),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered writes and fsync the file.
    pub fn sync(&self) -> io::Result<()> {
        let mut appender = self.appender.lock();
        appender.writer.flush()?;
        appender.writer.get_ref().sync_all()
    }

    /// Read every intact record in file order as `(offset, record)`.
    ///
    /// Stops at the first truncated frame or CRC mismatch, logging a warning.
    pub fn records(&self) -> io::Result<Vec<(u64, StoredVector)>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        let mut offset = 0u64;
        loop {
            match read_frame(&mut reader) {
                Ok(Some((record, frame_len))) => {
                    records.push((offset, record));
                    offset += frame_len;
                }
                Ok(None) => break,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::warn!(offset, "vector store truncated mid-record, stopping scan");
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    tracing::warn!(offset, error = %e, "corrupt vector record, stopping scan");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }
}

impl VectorStore for FileVectorStore {
    fn write(&self, id: usize, vector: &[f32]) -> io::Result<u64> {
        let framed = serialize_and_frame(&StoredVectorRef {
            id: id as u64,
            vector,
        })?;

        let mut appender = self.appender.lock();
        let offset = appender.next_offset;
        appender.writer.write_all(&framed)?;
        appender.writer.flush()?;
        appender.next_offset += framed.len() as u64;
        Ok(offset)
    }

    fn read(&self, offset: u64) -> io::Result<Vec<f32>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        match read_frame(&mut file)? {
            Some((record, _)) => Ok(record.vector),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no record at offset {offset}"),
            )),
        }
    }
}

/// Read one frame. `Ok(None)` on a clean end of file.
fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<(StoredVector, u64)>> {
    let mut header = [0u8; FRAME_HEADER_LEN as usize];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let stored_crc = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    if len > MAX_RECORD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("record length {len} exceeds maximum {MAX_RECORD_LEN}"),
        ));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;
    let computed_crc = crc32fast::hash(&data);
    if computed_crc != stored_crc {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("CRC mismatch: stored {stored_crc:#010x}, computed {computed_crc:#010x}"),
        ));
    }
    let record = bincode::deserialize::<StoredVector>(&data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    Ok(Some((record, FRAME_HEADER_LEN + len as u64)))
}

/// Serialize a record into its on-disk frame format:
/// `[u32 len BE][u32 crc32 BE][bincode payload]`.
fn serialize_and_frame(record: &StoredVectorRef<'_>) -> io::Result<Vec<u8>> {
    let bytes = bincode::serialize(record).map_err(|e| io::Error::other(e.to_string()))?;
    if bytes.len() > MAX_RECORD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("record length {} exceeds maximum {MAX_RECORD_LEN}", bytes.len()),
        ));
    }
    let len = u32::try_from(bytes.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record too large"))?;
    let crc = crc32fast::hash(&bytes);

    let mut framed = Vec::with_capacity(FRAME_HEADER_LEN as usize + bytes.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&crc.to_be_bytes());
    framed.extend_from_slice(&bytes);
    Ok(framed)
}
