//! Subfile manager: opens the numbered subfiles of a DH file directory and
//! performs the fixed-stride block I/O described in `spec.md` §4.2.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{DhError, DhResult, ErrorContext, Subfile as SubfileKind};

/// Index subfiles run `~2` through `~33` (one per AK, `spec.md` §6).
pub const MAX_INDEX_SUBFILES: u8 = 32;

fn subfile_name(dir: &Path, n: u8) -> PathBuf {
    dir.join(format!("~{}", n))
}

/// One open numbered subfile (`~0`, `~1`, or an index `~N`).
pub struct Subfile {
    pub kind: SubfileKind,
    pub group_size_bytes: u32,
    pub header_bytes: u32,
    file: File,
}

impl Subfile {
    pub fn create(dir: &Path, n: u8, kind: SubfileKind) -> DhResult<Self> {
        let path = subfile_name(dir, n);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| DhError::Path { path: path.clone(), source: e })?;
        Ok(Self { kind, group_size_bytes: 0, header_bytes: 0, file })
    }

    pub fn open(dir: &Path, n: u8, kind: SubfileKind) -> DhResult<Self> {
        let path = subfile_name(dir, n);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| DhError::Path { path: path.clone(), source: e })?;
        Ok(Self { kind, group_size_bytes: 0, header_bytes: 0, file })
    }

    pub fn exists(dir: &Path, n: u8) -> bool {
        subfile_name(dir, n).exists()
    }

    fn offset_of(&self, group_number: u32) -> u64 {
        self.header_bytes as u64 + (group_number as u64 - 1) * self.group_size_bytes as u64
    }

    fn ctx(&self, group: u32, offset: u64) -> ErrorContext {
        ErrorContext::new().subfile(self.kind).group(group).offset(offset)
    }

    /// Reads exactly `bytes` at the slot for `group_number` (1-based).
    pub fn read_group(&mut self, group_number: u32, buf: &mut [u8], bytes: usize) -> DhResult<()> {
        let off = self.offset_of(group_number);
        self.file
            .seek(SeekFrom::Start(off))
            .map_err(|e| DhError::io(e, self.ctx(group_number, off)))?;
        self.file
            .read_exact(&mut buf[..bytes])
            .map_err(|e| DhError::io(e, self.ctx(group_number, off)))
    }

    /// Writes exactly `bytes` at the slot for `group_number` (1-based).
    pub fn write_group(&mut self, group_number: u32, buf: &[u8], bytes: usize) -> DhResult<()> {
        let off = self.offset_of(group_number);
        self.file
            .seek(SeekFrom::Start(off))
            .map_err(|e| DhError::io(e, self.ctx(group_number, off)))?;
        self.file
            .write_all(&buf[..bytes])
            .map_err(|e| DhError::io(e, self.ctx(group_number, off)))
    }

    /// Writes the raw header block (offset 0).
    pub fn write_header_raw(&mut self, buf: &[u8]) -> DhResult<()> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| DhError::io(e, self.ctx(0, 0)))?;
        self.file
            .write_all(buf)
            .map_err(|e| DhError::io(e, self.ctx(0, 0)))
    }

    pub fn read_header_raw(&mut self, buf: &mut [u8]) -> DhResult<()> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| DhError::io(e, self.ctx(0, 0)))?;
        self.file
            .read_exact(buf)
            .map_err(|e| DhError::io(e, self.ctx(0, 0)))
    }

    pub fn append_raw(&mut self, buf: &[u8]) -> DhResult<()> {
        self.file
            .seek(SeekFrom::End(0))
            .map_err(|e| DhError::io(e, self.ctx(0, 0)))?;
        self.file
            .write_all(buf)
            .map_err(|e| DhError::io(e, self.ctx(0, 0)))
    }

    pub fn len(&self) -> DhResult<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| DhError::io(e, self.ctx(0, 0)))
    }

    /// Number of blocks (or groups, for the primary) currently allocated
    /// past the header.
    pub fn block_count(&self) -> DhResult<u32> {
        let len = self.len()?;
        Ok(((len.saturating_sub(self.header_bytes as u64)) / self.group_size_bytes as u64) as u32)
    }

    pub fn set_len(&mut self, bytes: u64) -> DhResult<()> {
        self.file.set_len(bytes).map_err(|e| DhError::io(e, self.ctx(0, 0)))
    }

    pub fn sync(&self) -> DhResult<()> {
        self.file.sync_all().map_err(|e| DhError::io(e, self.ctx(0, 0)))
    }
}
