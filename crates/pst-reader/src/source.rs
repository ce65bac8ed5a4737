//! Positioned byte access over a file or an in-memory buffer.

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
    sync::Mutex,
};

/// Positioned reads against an immutable store. The caller always passes an
/// absolute offset; no cursor is exposed to higher layers.
pub trait ByteSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_vec_at(&self, offset: u64, length: usize) -> io::Result<Vec<u8>> {
        let mut buffer = vec![0; length];
        self.read_at(offset, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct FileSource {
    file: Mutex<File>,
    length: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            length,
        })
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned file lock"))?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }

    fn len(&self) -> u64 {
        self.length
    }
}

pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ByteSource for MemorySource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        let end = start
            .checked_add(buf.len())
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_read_at() {
        let source = MemorySource::new(vec![0, 1, 2, 3, 4, 5, 6, 7]);
        let mut buf = [0_u8; 4];
        source.read_at(2, &mut buf).unwrap();
        assert_eq!(buf, [2, 3, 4, 5]);
        assert_eq!(source.len(), 8);
    }

    #[test]
    fn test_memory_read_past_end() {
        let source = MemorySource::new(vec![0; 4]);
        let mut buf = [0_u8; 4];
        let err = source.read_at(2, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_file_read_at() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(b"0123456789").unwrap();
        temp.flush().unwrap();

        let source = FileSource::open(temp.path()).unwrap();
        assert_eq!(source.len(), 10);

        let mut buf = [0_u8; 3];
        source.read_at(7, &mut buf).unwrap();
        assert_eq!(&buf, b"789");

        // positioned reads are independent of each other
        source.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"012");
    }
}
