//! Raw file sources and sinks: little-endian `f32` vectors and plain bytes.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::utils::error::{DabError, Result};

/// Reads fixed length vectors of little-endian `f32` values.
pub struct VectorFileSource {
    path: PathBuf,
    reader: BufReader<File>,
    vector_len: usize,
    raw: Vec<u8>,
    items: usize,
    total: usize,
    done: bool,
}

impl VectorFileSource {
    pub fn open<P: AsRef<Path>>(path: P, vector_len: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            DabError::stream(format!("cannot open {}: {}", path.display(), e))
        })?;
        if vector_len == 0 {
            return Err(DabError::config("vector length must be positive"));
        }
        let size = file.metadata()?.len() as usize;
        let item_bytes = vector_len * 4;
        if size % item_bytes != 0 {
            warn!(
                "{}: {} trailing bytes do not form a whole vector and will be ignored",
                path.display(),
                size % item_bytes
            );
        }
        debug!(
            "Vector source {}: {} items of {} floats",
            path.display(),
            size / item_bytes,
            vector_len
        );
        Ok(Self {
            path,
            reader: BufReader::with_capacity(1 << 20, file),
            vector_len,
            raw: vec![0u8; item_bytes],
            items: 0,
            total: size / item_bytes,
            done: false,
        })
    }

    pub fn vector_len(&self) -> usize {
        self.vector_len
    }

    pub fn items_read(&self) -> usize {
        self.items
    }

    /// Whole vectors in the file when it was opened
    pub fn total_items(&self) -> usize {
        self.total
    }

    fn read_item(&mut self) -> Result<Option<Vec<f32>>> {
        let mut filled = 0;
        while filled < self.raw.len() {
            let n = self.reader.read(&mut self.raw[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < self.raw.len() {
            if filled > 0 {
                debug!("{}: dropped truncated last item", self.path.display());
            }
            return Ok(None);
        }
        let mut item = vec![0.0f32; self.vector_len];
        LittleEndian::read_f32_into(&self.raw, &mut item);
        self.items += 1;
        Ok(Some(item))
    }
}

impl Iterator for VectorFileSource {
    type Item = Result<Vec<f32>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_item() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Reads a file one byte item at a time.
pub struct ByteFileSource {
    bytes: std::io::Bytes<BufReader<File>>,
}

impl ByteFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            DabError::stream(format!("cannot open {}: {}", path.display(), e))
        })?;
        Ok(Self {
            bytes: BufReader::new(file).bytes(),
        })
    }
}

impl Iterator for ByteFileSource {
    type Item = Result<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        self.bytes.next().map(|b| b.map_err(DabError::from))
    }
}

/// Buffered raw byte sink.
pub struct ByteFileSink {
    writer: BufWriter<File>,
    written: usize,
}

impl ByteFileSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            written: 0,
        })
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.written += data.len();
        Ok(())
    }

    pub fn bytes_written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.written)
    }
}

/// Writes vectors as little-endian `f32`
pub struct VectorFileSink {
    writer: BufWriter<File>,
    items: usize,
}

impl VectorFileSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::with_capacity(1 << 20, File::create(path)?),
            items: 0,
        })
    }

    pub fn write(&mut self, item: &[f32]) -> Result<()> {
        for &value in item {
            self.writer.write_f32::<LittleEndian>(value)?;
        }
        self.items += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.items)
    }
}
