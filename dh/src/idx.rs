//! Index-subfile relocation helpers (`spec.md` §6's `qmidx` CLI signature;
//! Supplemented feature #7), grounded on `qmidx.c`'s four modes: delete,
//! move, set-path, query.
//!
//! The index subfiles themselves (`~2..~33`, one per AK) are opaque per
//! `spec.md` §1; this module only ever moves, deletes, or reports their
//! *pathnames* — it never reads or writes their contents. The primary
//! header's `ak_map` bitmask says which of the 32 possible indices exist;
//! `akpath`, when non-empty, says they have been relocated to a directory
//! other than the file's own.

use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::{AK_BASE_SUBFILE, MAX_INDICES};
use crate::error::{DhError, DhResult, Subfile as SubfileKind};
use crate::header::PrimaryHeader;
use crate::subfile::Subfile;

/// Reads the primary header's raw `ak_map`/`akpath` state without
/// otherwise touching the file (no group lock: this is an offline tool
/// operating the way `qmconv` does, per `spec.md` §4.11).
pub fn read_ak_state(dir: &Path) -> DhResult<PrimaryHeader> {
    let mut primary = Subfile::open(dir, 0, SubfileKind::Primary)?;
    let mut raw = vec![0u8; std::mem::size_of::<PrimaryHeader>()];
    primary.read_header_raw(&mut raw)?;
    let header = PrimaryHeader::from_bytes(&raw);
    if header.magic != crate::consts::DH_PRIMARY {
        return Err(DhError::structural("primary header has an unrecognized magic number", crate::error::ErrorContext::new()));
    }
    Ok(header)
}

fn write_ak_state(dir: &Path, header: &PrimaryHeader) -> DhResult<()> {
    let mut primary = Subfile::open(dir, 0, SubfileKind::Primary)?;
    let mut raw = vec![0u8; std::mem::size_of::<PrimaryHeader>()];
    header.write_into(&mut raw);
    primary.write_header_raw(&raw)
}

/// Pathname of local index subfile `ak` (0-based) inside `dir`, the way
/// `qmidx.c`'s `SF(ak)` macro (`ak + AK_BASE_SUBFILE`) numbers them.
fn local_index_path(dir: &Path, ak: u32) -> PathBuf {
    dir.join(format!("~{}", AK_BASE_SUBFILE as u32 + ak))
}

fn local_index_paths(dir: &Path, ak_map: u32) -> Vec<PathBuf> {
    (0..MAX_INDICES).filter(|ak| ak_map & (1 << ak) != 0).map(|ak| local_index_path(dir, ak)).collect()
}

/// `qmidx -d`: deletes every index subfile, whether local or relocated,
/// and clears `ak_map`/`akpath` (`qmidx.c`'s `case 'D'`).
pub fn delete_indices(dir: &Path) -> DhResult<()> {
    let mut header = read_ak_state(dir)?;
    let akpath = header.ak_path();

    if !akpath.is_empty() && Path::new(&akpath).is_dir() {
        remove_dir(Path::new(&akpath))?;
    } else {
        for p in local_index_paths(dir, header.ak_map) {
            let _ = fs::remove_file(p);
        }
    }

    header.ak_map = 0;
    header.set_ak_path("");
    write_ak_state(dir, &header)
}

/// `qmidx -m`: copies every index subfile to `new_akpath` (or back to the
/// file's own directory when `new_akpath` is empty), updates `akpath`,
/// then removes the old copies (`qmidx.c`'s `case 'M'`).
pub fn move_indices(dir: &Path, new_akpath: &str) -> DhResult<()> {
    let mut header = read_ak_state(dir)?;
    let old_akpath = header.ak_path();

    if old_akpath == new_akpath {
        return Err(DhError::Policy("indices are already at this location"));
    }

    if !new_akpath.is_empty() {
        if Path::new(new_akpath).exists() {
            return Err(DhError::Policy("target index directory already exists"));
        }
        fs::create_dir_all(new_akpath).map_err(|e| DhError::Path { path: PathBuf::from(new_akpath), source: e })?;
    }

    let source_paths: Vec<PathBuf> = if old_akpath.is_empty() {
        local_index_paths(dir, header.ak_map)
    } else {
        (0..MAX_INDICES)
            .filter(|ak| header.ak_map & (1 << ak) != 0)
            .map(|ak| Path::new(&old_akpath).join(format!("~{}", AK_BASE_SUBFILE as u32 + ak)))
            .collect()
    };

    let target_dir: PathBuf = if new_akpath.is_empty() { dir.to_path_buf() } else { PathBuf::from(new_akpath) };
    for src in &source_paths {
        if let Some(name) = src.file_name() {
            let dst = target_dir.join(name);
            if src.exists() {
                fs::copy(src, &dst).map_err(|e| DhError::Path { path: dst.clone(), source: e })?;
            }
        }
    }

    if !old_akpath.is_empty() {
        remove_dir(Path::new(&old_akpath))?;
    } else {
        for p in &source_paths {
            let _ = fs::remove_file(p);
        }
    }

    if !header.set_ak_path(new_akpath) {
        return Err(DhError::Policy("index path too long"));
    }
    write_ak_state(dir, &header)
}

/// `qmidx -p`: records that indices already live at `new_akpath` without
/// copying anything — used after the directory has been moved by hand
/// (`qmidx.c`'s `case 'P'`).
pub fn set_index_path(dir: &Path, new_akpath: &str) -> DhResult<()> {
    let mut header = read_ak_state(dir)?;
    if header.ak_path() == new_akpath {
        return Err(DhError::Policy("indices are already at this location"));
    }
    if !new_akpath.is_empty() {
        let p = Path::new(new_akpath);
        if !p.exists() {
            return Err(DhError::Policy("target index directory does not exist"));
        }
        if !p.is_dir() {
            return Err(DhError::Policy("target index path is not a directory"));
        }
    }
    if !header.set_ak_path(new_akpath) {
        return Err(DhError::Policy("index path too long"));
    }
    write_ak_state(dir, &header)
}

/// What `qmidx -q` (or no mode at all) reports (`qmidx.c`'s `case 'Q'`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexReport {
    NoIndices,
    NotRelocated,
    RelocatedTo(String),
}

/// `qmidx -q`: reports whether the file has indices and where they live.
pub fn query_path(dir: &Path) -> DhResult<IndexReport> {
    let header = read_ak_state(dir)?;
    if header.ak_map == 0 {
        return Ok(IndexReport::NoIndices);
    }
    let akpath = header.ak_path();
    if akpath.is_empty() {
        Ok(IndexReport::NotRelocated)
    } else {
        Ok(IndexReport::RelocatedTo(akpath))
    }
}

fn remove_dir(path: &Path) -> DhResult<()> {
    fs::remove_dir_all(path).map_err(|e| DhError::Path { path: path.to_path_buf(), source: e })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::handle::create_file_default;
    use tempfile::tempdir;

    fn make_file() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        create_file_default(&dir.path().join("data"), 0).unwrap();
        dir
    }

    #[test]
    fn query_reports_no_indices_by_default() {
        let dir = make_file();
        let report = query_path(&dir.path().join("data")).unwrap();
        assert_eq!(report, IndexReport::NoIndices);
    }

    #[test]
    fn set_and_query_relocated_path() {
        let dir = make_file();
        let data_dir = dir.path().join("data");
        let mut header = read_ak_state(&data_dir).unwrap();
        header.ak_map = 1;
        write_ak_state(&data_dir, &header).unwrap();

        let target = dir.path().join("indices");
        fs::create_dir_all(&target).unwrap();
        set_index_path(&data_dir, target.to_str().unwrap()).unwrap();

        let report = query_path(&data_dir).unwrap();
        assert_eq!(report, IndexReport::RelocatedTo(target.to_str().unwrap().to_string()));
    }

    #[test]
    fn delete_indices_clears_ak_map() {
        let dir = make_file();
        let data_dir = dir.path().join("data");
        let mut header = read_ak_state(&data_dir).unwrap();
        header.ak_map = 0b101;
        write_ak_state(&data_dir, &header).unwrap();
        fs::write(local_index_path(&data_dir, 0), b"stub").unwrap();
        fs::write(local_index_path(&data_dir, 2), b"stub").unwrap();

        delete_indices(&data_dir).unwrap();

        let header = read_ak_state(&data_dir).unwrap();
        assert_eq!(header.ak_map, 0);
        assert!(!local_index_path(&data_dir, 0).exists());
    }
}
