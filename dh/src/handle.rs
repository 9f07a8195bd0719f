//! Public API: `create_file`, `open`, `close`, `read`, `exists`, `write`,
//! `delete`, `clear`, `analyse` (`spec.md` §6), wired over the lower
//! modules.
//!
//! A `Handle`'s two open subfiles are each held behind a `Mutex`, so
//! concurrent calls on one `Handle` serialize their physical I/O while
//! still observing the group-lock discipline above it for DH-level
//! semantics (`spec.md` §4.3 describes the lock table; it does not
//! mandate a particular physical-I/O concurrency model, and a library
//! embedded in one process has no SysV segment to coordinate through, so
//! this is the simplification recorded in `DESIGN.md`).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::akhook::{AkHook, AkMode};
use crate::analyse::{self, Analysis};
use crate::bigrec;
use crate::block::init_data_block;
use crate::consts::{
    DEFAULT_MERGE_LOAD, DEFAULT_MIN_MODULUS, DEFAULT_SPLIT_LOAD, DHF_NOCASE, DHF_NO_RESIZE, DH_VERSION, VERSION_1_SIZE_LIMIT,
};
use crate::error::{DhError, DhResult, ErrorContext, Subfile as SubfileKind};
use crate::file_table::{FileEntry, FileId, FileTable};
use crate::group::{self, Pending};
use crate::hash::{dh_hash_group, fold_nocase, mod_value_for};
use crate::header::{header_bytes, OverflowHeader, Params, PrimaryHeader};
use crate::lock_table::{LockTable, HEADER_GROUP};
use crate::overflow;
use crate::record::is_big_record;
use crate::split_merge;
use crate::subfile::Subfile;
use crate::util;

/// Creates a new DH file at `dir` (`spec.md` §4.10).
#[allow(clippy::too_many_arguments)]
pub fn create_file(
    dir: &Path,
    group_size: u16,
    min_modulus: u32,
    big_rec_size: u32,
    merge_load: u16,
    split_load: u16,
    flags: u16,
    version: u8,
) -> DhResult<()> {
    if !util::valid_group_size(group_size) {
        return Err(DhError::Policy("group_size out of range"));
    }
    if min_modulus < 1 {
        return Err(DhError::Policy("min_modulus must be at least 1"));
    }
    if !(merge_load < split_load && split_load <= 99) {
        return Err(DhError::Policy("merge_load must be < split_load <= 99"));
    }
    if version > DH_VERSION {
        return Err(DhError::Policy("requested version is newer than this engine supports"));
    }

    let group_size_bytes = util::group_size_bytes(group_size);
    let header_sz = header_bytes(group_size_bytes);
    let max_rec = group_size_bytes - crate::block::BLOCK_HEADER_SIZE as u32;
    let big_rec_size = if big_rec_size == 0 { util::default_big_rec_size(group_size_bytes) } else { big_rec_size };
    if !(big_rec_size > 0 && big_rec_size <= max_rec) {
        return Err(DhError::Policy("big_rec_size out of range"));
    }

    if version < 2 {
        let projected = header_sz as u64 + min_modulus as u64 * group_size_bytes as u64;
        if projected > VERSION_1_SIZE_LIMIT {
            return Err(DhError::Policy("version-1 file would exceed the 2 GiB size limit"));
        }
    }

    if dir.exists() {
        return Err(DhError::Policy("file directory already exists"));
    }
    fs::create_dir_all(dir).map_err(|e| DhError::Path { path: dir.to_path_buf(), source: e })?;

    let mut primary = Subfile::create(dir, 0, SubfileKind::Primary)?;
    primary.group_size_bytes = group_size_bytes;
    primary.header_bytes = header_sz;

    let params = Params {
        modulus: min_modulus,
        min_modulus,
        mod_value: mod_value_for(min_modulus),
        big_rec_size,
        split_load,
        merge_load,
        load_bytes: 0,
        extended_load_bytes: 0,
        free_chain: 0,
        longest_id: 0,
    };
    let header = PrimaryHeader {
        file_version: version,
        group_size: group_size_bytes,
        params,
        flags,
        creation_timestamp: util::now_unix(),
        ..Default::default()
    };
    let mut raw = vec![0u8; header_sz as usize];
    header.write_into(&mut raw);
    primary.write_header_raw(&raw)?;

    let mut empty_group = vec![0u8; group_size_bytes as usize];
    init_data_block(&mut empty_group);
    for g in 1..=min_modulus {
        primary.write_group(g, &empty_group, group_size_bytes as usize)?;
    }
    primary.sync()?;

    let mut overflow_sf = Subfile::create(dir, 1, SubfileKind::Overflow)?;
    overflow_sf.group_size_bytes = group_size_bytes;
    overflow_sf.header_bytes = header_sz;
    let oheader = OverflowHeader { group_size: group_size_bytes, ..Default::default() };
    let mut oraw = vec![0u8; header_sz as usize];
    oheader.write_into(&mut oraw);
    overflow_sf.write_header_raw(&oraw)?;
    overflow_sf.sync()?;

    info!("created DH file at {}", dir.display());
    Ok(())
}

/// Creates a file using the historical "-1 means default" knobs
/// (`spec.md` §9 design note).
pub fn create_file_default(dir: &Path, flags: u16) -> DhResult<()> {
    create_file(
        dir,
        crate::consts::DEFAULT_GROUP_SIZE,
        DEFAULT_MIN_MODULUS,
        0,
        DEFAULT_MERGE_LOAD,
        DEFAULT_SPLIT_LOAD,
        flags,
        DH_VERSION,
    )
}

/// An open DH file. Two `Handle`s opened on the same directory in one
/// process resolve to the same file-table entry (refcounted) and share
/// the same group locks, matching the original engine's per-process
/// refcounted open.
pub struct Handle {
    dir: PathBuf,
    id: FileId,
    table: Arc<FileTable>,
    locks: Arc<LockTable>,
    primary: Mutex<Subfile>,
    overflow: Mutex<Subfile>,
    ak_hook: Option<Arc<dyn AkHook>>,
}

impl Handle {
    /// Opens an existing DH file (`spec.md` §4.10).
    pub fn open(dir: &Path) -> DhResult<Self> {
        Self::open_with_hook(dir, None)
    }

    pub fn open_with_hook(dir: &Path, ak_hook: Option<Arc<dyn AkHook>>) -> DhResult<Self> {
        let mut primary = Subfile::open(dir, 0, SubfileKind::Primary)?;
        let mut raw = vec![0u8; std::mem::size_of::<PrimaryHeader>()];
        primary.read_header_raw(&mut raw)?;
        let header = PrimaryHeader::from_bytes(&raw);

        if header.magic == crate::consts::DH_CONVERTING || header.magic.swap_bytes() == crate::consts::DH_CONVERTING {
            return Err(DhError::Policy("file is mid-conversion and cannot be opened"));
        }
        if header.magic != crate::consts::DH_PRIMARY {
            if PrimaryHeader::is_big_endian_magic(header.magic) {
                return Err(DhError::Policy("file is in foreign-endian format; run the converter first"));
            }
            return Err(DhError::structural("primary header has an invalid magic number", ErrorContext::new().subfile(SubfileKind::Primary)));
        }
        if header.file_version > DH_VERSION {
            return Err(DhError::Policy("file version is newer than this engine supports"));
        }

        let group_size_bytes = header.group_size;
        let header_sz = header_bytes(group_size_bytes);
        primary.group_size_bytes = group_size_bytes;
        primary.header_bytes = header_sz;

        let mut overflow = Subfile::open(dir, 1, SubfileKind::Overflow)?;
        overflow.group_size_bytes = group_size_bytes;
        overflow.header_bytes = header_sz;

        let table = FileTable::global();
        let dir_buf = dir.to_path_buf();
        let id = table.register(&dir_buf, || FileEntry {
            dir: dir_buf.clone(),
            params: header.params,
            flags: header.flags,
            group_size_bytes,
            header_bytes: header_sz,
            record_count: header.record_count,
            file_version: header.file_version,
            refcount: 1,
            inhibit_count: 0,
        })?;

        Ok(Self {
            dir: dir_buf,
            id,
            table,
            locks: LockTable::global(),
            primary: Mutex::new(primary),
            overflow: Mutex::new(overflow),
            ak_hook,
        })
    }

    /// `close` per `spec.md` §4.10: drops this handle's reference; the
    /// file table entry is removed once the last handle on this
    /// directory closes.
    pub fn close(self) {
        // Drop impl does the actual unregister.
    }

    fn nocase(&self) -> DhResult<bool> {
        self.table.with_entry(self.id, |e| Ok(e.flags & DHF_NOCASE != 0))
    }

    fn group_for(&self, id: &[u8]) -> DhResult<u32> {
        let nocase = self.nocase()?;
        let folded;
        let id = if nocase {
            folded = fold_nocase(id);
            folded.as_slice()
        } else {
            id
        };
        self.table.with_entry(self.id, |e| Ok(dh_hash_group(id, e.params.modulus, e.params.mod_value)))
    }

    pub fn exists(&self, id: &[u8]) -> DhResult<bool> {
        let group_number = self.group_for(id)?;
        let lease = self.locks.read(self.id, group_number)?;
        let _guard = lease.lock();
        let nocase = self.nocase()?;
        let mut primary = self.primary.lock().unwrap();
        let mut overflow = self.overflow.lock().unwrap();
        let group_size_bytes = self.table.with_entry(self.id, |e| Ok(e.group_size_bytes))?;
        group::exists(&mut primary, &mut overflow, group_size_bytes, group_number, id, nocase)
    }

    /// `read` (`spec.md` §4.4).
    pub fn read(&self, id: &[u8]) -> DhResult<Option<Vec<u8>>> {
        let group_number = self.group_for(id)?;
        let lease = self.locks.read(self.id, group_number)?;
        let _guard = lease.lock();
        let nocase = self.nocase()?;
        let mut primary = self.primary.lock().unwrap();
        let mut overflow = self.overflow.lock().unwrap();
        let group_size_bytes = self.table.with_entry(self.id, |e| Ok(e.group_size_bytes))?;
        group::read(&mut primary, &mut overflow, group_size_bytes, group_number, id, nocase)
    }

    /// `write` (`spec.md` §4.5).
    pub fn write(&self, id: &[u8], data: &[u8]) -> DhResult<()> {
        let (big_rec_size, group_size_bytes) = self.table.with_entry(self.id, |e| Ok((e.params.big_rec_size, e.group_size_bytes)))?;

        let is_big = is_big_record(id.len(), data.len(), big_rec_size);

        // Step 1: write the large-record chain before taking the group
        // lock, under the header lock only.
        let big_head = if is_big {
            let header_lease = self.locks.write(self.id, HEADER_GROUP)?;
            let _header_guard = header_lease.lock();
            let mut overflow = self.overflow.lock().unwrap();
            let head = bigrec::write_chain(&mut overflow, group_size_bytes, data, |of| self.take_overflow_block(of))?;
            Some(head)
        } else {
            None
        };

        let group_number = self.group_for(id)?;
        let lease = self.locks.write(self.id, group_number)?;
        let _guard = lease.lock();
        let nocase = self.nocase()?;

        let outcome = {
            let mut primary = self.primary.lock().unwrap();
            let mut overflow = self.overflow.lock().unwrap();
            let pending = match big_head {
                Some(head) => Pending::Big { head },
                None => Pending::Inline(data),
            };
            let header_lease_for_alloc = self.locks.write(self.id, HEADER_GROUP)?;
            group::write(
                &mut primary,
                &mut overflow,
                group_size_bytes,
                group_number,
                id,
                pending,
                nocase,
                |of| {
                    let _g = header_lease_for_alloc.lock();
                    self.take_overflow_block(of)
                },
                |of, block| {
                    let _g = header_lease_for_alloc.lock();
                    self.free_overflow_block(of, block)
                },
            )?
        };

        // Step 7: release already happened (guards dropped above via
        // scope); free any displaced big-record chain now.
        if let Some(old_head) = outcome.displaced_big_head {
            let header_lease = self.locks.write(self.id, HEADER_GROUP)?;
            let _g = header_lease.lock();
            let mut overflow = self.overflow.lock().unwrap();
            bigrec::free_chain(&mut overflow, group_size_bytes, old_head, |of, block| self.free_overflow_block(of, block))?;
        }

        // Step 8: AK hook, no DH lock held.
        if let Some(hook) = &self.ak_hook {
            let mode = if outcome.existed { AkMode::Mod } else { AkMode::Add };
            hook.on_change(mode, id, None, Some(data));
        }

        // Step 9: adjust file-wide bookkeeping and persist it.
        let delta = outcome.new_base_size as i64 - outcome.old_base_size as i64;
        let should_resize = self.table.with_entry(self.id, |e| {
            e.params.load_bytes = (e.params.load_bytes as i64 + delta).max(0) as u64;
            e.params.longest_id = e.params.longest_id.max(id.len() as u16);
            if !outcome.existed {
                e.record_count += 1;
            }
            Ok(e.flags & DHF_NO_RESIZE == 0)
        })?;
        self.flush_header()?;

        debug!("wrote id of {} bytes to group {}", id.len(), group_number);

        if should_resize {
            self.maybe_resize()?;
        }
        Ok(())
    }

    /// `delete` (`spec.md` §4.6).
    pub fn delete(&self, id: &[u8]) -> DhResult<bool> {
        let group_number = self.group_for(id)?;
        let (group_size_bytes,) = self.table.with_entry(self.id, |e| Ok((e.group_size_bytes,)))?;
        let nocase = self.nocase()?;

        let lease = self.locks.write(self.id, group_number)?;
        let _guard = lease.lock();

        let outcome = {
            let mut primary = self.primary.lock().unwrap();
            let mut overflow = self.overflow.lock().unwrap();
            let header_lease_for_alloc = self.locks.write(self.id, HEADER_GROUP)?;
            group::delete(
                &mut primary,
                &mut overflow,
                group_size_bytes,
                group_number,
                id,
                nocase,
                |of| {
                    let _g = header_lease_for_alloc.lock();
                    self.take_overflow_block(of)
                },
                |of, block| {
                    let _g = header_lease_for_alloc.lock();
                    self.free_overflow_block(of, block)
                },
            )?
        };

        let Some(outcome) = outcome else { return Ok(false) };

        if let Some(head) = outcome.displaced_big_head {
            let header_lease = self.locks.write(self.id, HEADER_GROUP)?;
            let _g = header_lease.lock();
            let mut overflow = self.overflow.lock().unwrap();
            bigrec::free_chain(&mut overflow, group_size_bytes, head, |of, block| self.free_overflow_block(of, block))?;
        }

        if let Some(hook) = &self.ak_hook {
            hook.on_change(AkMode::Del, id, None, None);
        }

        self.table.with_entry(self.id, |e| {
            e.params.load_bytes = e.params.load_bytes.saturating_sub(outcome.old_base_size as u64);
            e.record_count = e.record_count.saturating_sub(1);
            Ok(())
        })?;
        self.flush_header()?;

        self.maybe_resize()?;
        Ok(true)
    }

    /// Rewrites the primary header's `params`/`flags`/`record_count` from
    /// the in-memory file-table entry, taking the header/group-0 lock
    /// itself. `write` and `delete` call this once their own lock scopes
    /// have ended.
    fn flush_header(&self) -> DhResult<()> {
        let header_lease = self.locks.write(self.id, HEADER_GROUP)?;
        let _g = header_lease.lock();
        self.flush_header_locked()
    }

    /// Same as [`Self::flush_header`] but assumes the caller already holds
    /// the header/group-0 write lock (split and merge hold it for their
    /// whole operation), and has not already locked `self.primary`.
    fn flush_header_locked(&self) -> DhResult<()> {
        let mut primary = self.primary.lock().unwrap();
        self.write_header_with(&mut primary)
    }

    /// Core read-modify-write of the primary header's mutable fields,
    /// given a `Subfile` the caller already holds the lock for.
    fn write_header_with(&self, primary: &mut Subfile) -> DhResult<()> {
        let (params, flags, record_count) = self.table.with_entry(self.id, |e| Ok((e.params, e.flags, e.record_count)))?;
        let mut raw = vec![0u8; std::mem::size_of::<PrimaryHeader>()];
        primary.read_header_raw(&mut raw)?;
        let mut header = PrimaryHeader::from_bytes(&raw);
        header.params = params;
        header.flags = flags;
        header.record_count = record_count;
        header.write_into(&mut raw);
        primary.write_header_raw(&raw)
    }

    fn take_overflow_block(&self, overflow: &mut Subfile) -> DhResult<u32> {
        let free_chain = self.table.with_entry(self.id, |e| Ok(e.params.free_chain))?;
        let group_size_bytes = self.table.with_entry(self.id, |e| Ok(e.group_size_bytes))?;
        let (block, new_head) = overflow::get_overflow(overflow, group_size_bytes, free_chain)?;
        self.table.with_entry(self.id, |e| {
            e.params.free_chain = new_head;
            Ok(())
        })?;
        Ok(block)
    }

    fn free_overflow_block(&self, overflow: &mut Subfile, block: u32) -> DhResult<()> {
        let (free_chain, group_size_bytes) = self.table.with_entry(self.id, |e| Ok((e.params.free_chain, e.group_size_bytes)))?;
        let new_head = overflow::free_overflow(overflow, group_size_bytes, block, free_chain)?;
        self.table.with_entry(self.id, |e| {
            e.params.free_chain = new_head;
            Ok(())
        })
    }

    /// Bumps this file's `inhibit_count`, forbidding `maybe_resize` from
    /// running a split or merge until the returned guard drops.
    fn inhibit(&self) -> DhResult<InhibitGuard<'_>> {
        self.table.with_entry(self.id, |e| {
            e.inhibit_count += 1;
            Ok(())
        })?;
        Ok(InhibitGuard { handle: self })
    }

    fn uninhibit(&self) {
        let _ = self.table.with_entry(self.id, |e| {
            e.inhibit_count = e.inhibit_count.saturating_sub(1);
            Ok(())
        });
    }

    /// Evaluates split/merge after a write/delete (`spec.md` §4.5 step
    /// 10, §4.6, §4.7). Deferred entirely while another operation (e.g.
    /// `analyse`) holds `inhibit_count` above zero.
    fn maybe_resize(&self) -> DhResult<()> {
        let snapshot = self.table.with_entry(self.id, |e| Ok((e.params, e.group_size_bytes, e.flags, e.inhibit_count)))?;
        let (params, group_size_bytes, flags, inhibit_count) = snapshot;
        if flags & DHF_NO_RESIZE != 0 || inhibit_count > 0 {
            return Ok(());
        }
        let load = split_merge::dh_load(params.load_bytes, group_size_bytes, params.modulus);

        if split_merge::should_split(load, params.split_load, params.modulus, params.min_modulus) {
            self.run_split(group_size_bytes)?;
        } else if split_merge::should_merge(load, params.merge_load, params.modulus, params.min_modulus) {
            self.run_merge(group_size_bytes)?;
        }
        Ok(())
    }

    fn run_split(&self, group_size_bytes: u32) -> DhResult<()> {
        let header_lease = self.locks.write(self.id, HEADER_GROUP)?;
        let _header_guard = header_lease.lock();

        if self.table.with_entry(self.id, |e| Ok(e.inhibit_count))? > 0 {
            return Ok(());
        }

        let params = self.table.with_entry(self.id, |e| Ok(e.params))?;
        let load = split_merge::dh_load(params.load_bytes, group_size_bytes, params.modulus);
        if !split_merge::should_split(load, params.split_load, params.modulus, params.min_modulus) {
            return Ok(());
        }

        let (new_modulus, new_mod_value, new_group, source_group) = split_merge::split_params(params.modulus, params.mod_value);

        // Supplemented feature #6: a version < 2 file silently skips a
        // split that would push the primary subfile past the 2 GiB limit
        // rather than erroring.
        let (header_bytes, file_version) = self.table.with_entry(self.id, |e| Ok((e.header_bytes, e.file_version)))?;
        let projected = header_bytes as u64 + new_modulus as u64 * group_size_bytes as u64;
        if file_version < 2 && projected > VERSION_1_SIZE_LIMIT {
            warn!("skipping split on version-1 file: would exceed the 2 GiB size limit");
            return Ok(());
        }

        let new_lease = self.locks.write(self.id, new_group)?;
        let _new_guard = new_lease.lock();
        let source_lease = self.locks.write(self.id, source_group)?;
        let _source_guard = source_lease.lock();

        let nocase = self.table.with_entry(self.id, |e| Ok(e.flags & DHF_NOCASE != 0))?;
        let mut primary = self.primary.lock().unwrap();
        let mut overflow = self.overflow.lock().unwrap();
        split_merge::execute_split(
            &mut primary,
            &mut overflow,
            group_size_bytes,
            source_group,
            new_group,
            new_modulus,
            new_mod_value,
            nocase,
            |of| self.take_overflow_block(of),
            |of, b| self.free_overflow_block(of, b),
        )?;
        drop(primary);
        drop(overflow);

        self.table.with_entry(self.id, |e| {
            e.params.modulus = new_modulus;
            e.params.mod_value = new_mod_value;
            Ok(())
        })?;
        self.flush_header_locked()?;
        info!("split group {} into {} (modulus now {})", source_group, new_group, new_modulus);
        Ok(())
    }

    fn run_merge(&self, group_size_bytes: u32) -> DhResult<()> {
        let header_lease = self.locks.write(self.id, HEADER_GROUP)?;
        let _header_guard = header_lease.lock();

        if self.table.with_entry(self.id, |e| Ok(e.inhibit_count))? > 0 {
            return Ok(());
        }

        let params = self.table.with_entry(self.id, |e| Ok(e.params))?;
        let load = split_merge::dh_load(params.load_bytes, group_size_bytes, params.modulus);
        if !split_merge::should_merge(load, params.merge_load, params.modulus, params.min_modulus) {
            return Ok(());
        }

        let (new_modulus, new_mod_value, source_group, target_group) = split_merge::merge_params(params.modulus, params.mod_value);

        let target_lease = self.locks.write(self.id, target_group)?;
        let _target_guard = target_lease.lock();
        let source_lease = self.locks.write(self.id, source_group)?;
        let _source_guard = source_lease.lock();

        let mut primary = self.primary.lock().unwrap();
        let mut overflow = self.overflow.lock().unwrap();
        split_merge::execute_merge(
            &mut primary,
            &mut overflow,
            group_size_bytes,
            source_group,
            target_group,
            |of| self.take_overflow_block(of),
            |of, b| self.free_overflow_block(of, b),
        )?;
        drop(primary);
        drop(overflow);

        self.table.with_entry(self.id, |e| {
            e.params.modulus = new_modulus;
            e.params.mod_value = new_mod_value;
            Ok(())
        })?;
        self.flush_header_locked()?;
        info!("merged group {} into {} (modulus now {})", source_group, target_group, new_modulus);
        Ok(())
    }

    /// `clear` (`spec.md` §4.9): truncates both subfiles and rewrites an
    /// empty file at `min_modulus`.
    pub fn clear(&self) -> DhResult<()> {
        let header_lease = self.locks.write(self.id, HEADER_GROUP)?;
        let _g = header_lease.lock();

        let (min_modulus, group_size_bytes, header_sz, mut params) =
            self.table.with_entry(self.id, |e| Ok((e.params.min_modulus, e.group_size_bytes, e.header_bytes, e.params)))?;

        params.modulus = min_modulus;
        params.mod_value = mod_value_for(min_modulus);
        params.load_bytes = 0;
        params.extended_load_bytes = 0;
        params.free_chain = 0;

        let mut primary = self.primary.lock().unwrap();
        primary.set_len(header_sz as u64)?;
        let mut empty_group = vec![0u8; group_size_bytes as usize];
        init_data_block(&mut empty_group);
        for g in 1..=min_modulus {
            primary.write_group(g, &empty_group, group_size_bytes as usize)?;
        }

        let mut overflow = self.overflow.lock().unwrap();
        overflow.set_len(header_sz as u64)?;

        self.table.with_entry(self.id, |e| {
            e.params = params;
            e.record_count = 0;
            Ok(())
        })?;
        self.write_header_with(&mut primary)?;

        warn!("cleared DH file at {}", self.dir.display());
        Ok(())
    }

    /// `analyse` (`spec.md` §6, §8 scenario 4). Holds only `inhibit_count`
    /// for its duration, not the header/group-0 lock: ordinary writes and
    /// deletes continue to run concurrently, but `maybe_resize` defers any
    /// split or merge until the scan finishes, so groups don't move out
    /// from under it mid-walk.
    pub fn analyse(&self) -> DhResult<Analysis> {
        let _inhibit = self.inhibit()?;

        let (modulus, group_size_bytes) = self.table.with_entry(self.id, |e| Ok((e.params.modulus, e.group_size_bytes)))?;
        let mut primary = self.primary.lock().unwrap();
        let mut overflow = self.overflow.lock().unwrap();
        analyse::analyse(&mut primary, &mut overflow, group_size_bytes, modulus)
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.table.unregister(self.id);
    }
}

/// Holds one count of [`Handle::inhibit`] for as long as it's alive.
struct InhibitGuard<'a> {
    handle: &'a Handle,
}

impl Drop for InhibitGuard<'_> {
    fn drop(&mut self) {
        self.handle.uninhibit();
    }
}
