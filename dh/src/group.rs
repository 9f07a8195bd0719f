//! Group engine: `read`/`exists`/`write`/`delete` within one hash group's
//! chain of blocks (`spec.md` §4.4–§4.6).
//!
//! A group's chain starts at its slot in the primary subfile and
//! continues, via each block's `next` link, through blocks in the
//! overflow subfile. This module only knows how to walk and mutate that
//! chain — locking (`spec.md` §4.3) and cross-file bookkeeping
//! (`load_bytes`, `record_count`, the AK hook) are the caller's job, in
//! `dh::handle`.

use crate::bigrec;
use crate::block::{init_data_block, next_link, set_next_link, set_used_bytes, used_bytes, validate, BlockHeader, BLOCK_HEADER_SIZE};
use crate::consts::DHT_FREE;
use crate::error::{DhError, DhResult, ErrorContext, Subfile as SubfileKind};
use crate::hash::fold_nocase;
use crate::record::{align4, big_rec_len, encode_big, encode_inline, inline_len, RecordView};
use crate::subfile::Subfile;

/// Where a block in a chain physically lives.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Loc {
    Primary,
    Overflow,
}

fn read_block(primary: &mut Subfile, overflow: &mut Subfile, loc: Loc, num: u32, group_size_bytes: u32, buf: &mut [u8]) -> DhResult<()> {
    match loc {
        Loc::Primary => primary.read_group(num, buf, group_size_bytes as usize),
        Loc::Overflow => overflow.read_group(num, buf, group_size_bytes as usize),
    }
}

fn write_block(primary: &mut Subfile, overflow: &mut Subfile, loc: Loc, num: u32, group_size_bytes: u32, buf: &[u8]) -> DhResult<()> {
    match loc {
        Loc::Primary => primary.write_group(num, buf, group_size_bytes as usize),
        Loc::Overflow => overflow.write_group(num, buf, group_size_bytes as usize),
    }
}

fn validate_or_err(buf: &[u8], group_size_bytes: u32, loc: Loc, num: u32) -> DhResult<()> {
    if validate(buf, group_size_bytes) {
        Ok(())
    } else {
        let kind = if loc == Loc::Primary { SubfileKind::Primary } else { SubfileKind::Overflow };
        Err(DhError::structural(
            "invalid byte count or block type",
            ErrorContext::new().subfile(kind).group(num),
        ))
    }
}

fn ids_match(a: &[u8], b: &[u8], nocase: bool) -> bool {
    if nocase {
        fold_nocase(a) == fold_nocase(b)
    } else {
        a == b
    }
}

/// A located record match: which block it's in and its byte offset
/// within that block's buffer.
struct Found {
    loc: Loc,
    block_num: u32,
    buf: Vec<u8>,
    rec_off: usize,
}

fn find(
    primary: &mut Subfile,
    overflow: &mut Subfile,
    group_size_bytes: u32,
    group_number: u32,
    id: &[u8],
    nocase: bool,
) -> DhResult<Option<Found>> {
    let mut loc = Loc::Primary;
    let mut num = group_number;
    loop {
        let mut buf = vec![0u8; group_size_bytes as usize];
        read_block(primary, overflow, loc, num, group_size_bytes, &mut buf)?;
        validate_or_err(&buf, group_size_bytes, loc, num)?;

        let used = used_bytes(&buf) as usize;
        let mut off = BLOCK_HEADER_SIZE;
        while off < used {
            let rec = RecordView::at(&buf, off);
            let rec_len = rec.next() as usize;
            if rec_len == 0 {
                break;
            }
            if ids_match(rec.id(), id, nocase) {
                return Ok(Some(Found { loc, block_num: num, buf, rec_off: off }));
            }
            off += rec_len;
        }

        let next = next_link(&buf);
        if next == 0 {
            return Ok(None);
        }
        loc = Loc::Overflow;
        num = next;
    }
}

/// Reads the record payload for `id`, following a large-record chain if
/// needed. Returns `None` if not present.
pub fn read(
    primary: &mut Subfile,
    overflow: &mut Subfile,
    group_size_bytes: u32,
    group_number: u32,
    id: &[u8],
    nocase: bool,
) -> DhResult<Option<Vec<u8>>> {
    let found = find(primary, overflow, group_size_bytes, group_number, id, nocase)?;
    let Some(found) = found else { return Ok(None) };
    let rec = RecordView::at(&found.buf, found.rec_off);
    if rec.is_big_rec() {
        let head = rec.big_rec_head();
        Ok(Some(bigrec::read_chain(overflow, group_size_bytes, head)?))
    } else {
        Ok(Some(rec.data().to_vec()))
    }
}

pub fn exists(
    primary: &mut Subfile,
    overflow: &mut Subfile,
    group_size_bytes: u32,
    group_number: u32,
    id: &[u8],
    nocase: bool,
) -> DhResult<bool> {
    Ok(find(primary, overflow, group_size_bytes, group_number, id, nocase)?.is_some())
}

/// What the caller needs after a write to update file-wide state and
/// run the AK hook (`spec.md` §4.5 steps 7–9).
pub struct WriteOutcome {
    pub existed: bool,
    pub old_base_size: usize,
    pub new_base_size: usize,
    /// Chain head of a displaced old big record; the caller frees this
    /// only after releasing the group lock (§4.5 step 7).
    pub displaced_big_head: Option<u32>,
}

/// A record about to be written: either inline or already stored as a
/// large-record chain (written by the caller *before* taking the group
/// lock, per §4.5 step 1).
pub enum Pending<'a> {
    Inline(&'a [u8]),
    Big { head: u32 },
}

fn slot_size(id: &[u8], pending: &Pending) -> usize {
    match pending {
        Pending::Inline(data) => align4(inline_len(id.len(), data.len())),
        Pending::Big { .. } => align4(big_rec_len(id.len())),
    }
}

fn encode_at(buf: &mut [u8], off: usize, id: &[u8], pending: &Pending) {
    match pending {
        Pending::Inline(data) => {
            encode_inline(buf, off, id, data);
        }
        Pending::Big { head } => {
            encode_big(buf, off, id, *head);
        }
    }
}

/// Writes (inserts or overwrites) `id`'s record: `spec.md` §4.5 steps
/// 2–6. Overwrites in place when the new slot is the same size as an
/// existing record's; otherwise deletes the old record (with full §4.6
/// compaction) and appends the new one to the chain's tail, allocating a
/// fresh overflow block if no existing block has room.
pub fn write(
    primary: &mut Subfile,
    overflow: &mut Subfile,
    group_size_bytes: u32,
    group_number: u32,
    id: &[u8],
    pending: Pending,
    nocase: bool,
    mut alloc_overflow: impl FnMut(&mut Subfile) -> DhResult<u32>,
    mut free_overflow: impl FnMut(&mut Subfile, u32) -> DhResult<()>,
) -> DhResult<WriteOutcome> {
    let new_size = slot_size(id, &pending);
    let found = find(primary, overflow, group_size_bytes, group_number, id, nocase)?;

    if let Some(f) = &found {
        let rec = RecordView::at(&f.buf, f.rec_off);
        let old_size = rec.next() as usize;
        if old_size == new_size {
            let old_big_head = if rec.is_big_rec() { Some(rec.big_rec_head()) } else { None };
            let mut buf = f.buf.clone();
            encode_at(&mut buf, f.rec_off, id, &pending);
            write_block(primary, overflow, f.loc, f.block_num, group_size_bytes, &buf)?;
            return Ok(WriteOutcome { existed: true, old_base_size: old_size, new_base_size: new_size, displaced_big_head: old_big_head });
        }
    }

    let (old_base_size, displaced_big_head) = if let Some(f) = &found {
        let rec = RecordView::at(&f.buf, f.rec_off);
        let old_size = rec.next() as usize;
        let old_big_head = if rec.is_big_rec() { Some(rec.big_rec_head()) } else { None };
        delete_at(primary, overflow, group_size_bytes, group_number, f.loc, f.block_num, f.rec_off, &mut alloc_overflow, &mut free_overflow)?;
        (old_size, old_big_head)
    } else {
        (0, None)
    };

    append_to_chain(primary, overflow, group_size_bytes, group_number, id, &pending, new_size, &mut alloc_overflow)?;

    Ok(WriteOutcome { existed: found.is_some(), old_base_size, new_base_size: new_size, displaced_big_head })
}

fn append_to_chain(
    primary: &mut Subfile,
    overflow: &mut Subfile,
    group_size_bytes: u32,
    group_number: u32,
    id: &[u8],
    pending: &Pending,
    new_size: usize,
    alloc_overflow: &mut impl FnMut(&mut Subfile) -> DhResult<u32>,
) -> DhResult<()> {
    let mut loc = Loc::Primary;
    let mut num = group_number;
    loop {
        let mut buf = vec![0u8; group_size_bytes as usize];
        read_block(primary, overflow, loc, num, group_size_bytes, &mut buf)?;
        validate_or_err(&buf, group_size_bytes, loc, num)?;
        let used = used_bytes(&buf) as usize;

        if used + new_size <= group_size_bytes as usize {
            encode_at(&mut buf, used, id, pending);
            set_used_bytes(&mut buf, (used + new_size) as u16);
            write_block(primary, overflow, loc, num, group_size_bytes, &buf)?;
            return Ok(());
        }

        let next = next_link(&buf);
        if next != 0 {
            loc = Loc::Overflow;
            num = next;
            continue;
        }

        let new_block = alloc_overflow(overflow)?;
        set_next_link(&mut buf, new_block);
        write_block(primary, overflow, loc, num, group_size_bytes, &buf)?;

        let mut new_buf = vec![0u8; group_size_bytes as usize];
        init_data_block(&mut new_buf);
        encode_at(&mut new_buf, BLOCK_HEADER_SIZE, id, pending);
        set_used_bytes(&mut new_buf, (BLOCK_HEADER_SIZE + new_size) as u16);
        overflow.write_group(new_block, &new_buf, group_size_bytes as usize)?;
        return Ok(());
    }
}

/// What the caller needs after a delete (`spec.md` §4.6's final steps).
pub struct DeleteOutcome {
    pub old_base_size: usize,
    pub displaced_big_head: Option<u32>,
}

/// Deletes `id`'s record if present, compacting the chain per `spec.md`
/// §4.6. Returns `None` if `id` was not found.
pub fn delete(
    primary: &mut Subfile,
    overflow: &mut Subfile,
    group_size_bytes: u32,
    group_number: u32,
    id: &[u8],
    nocase: bool,
    mut alloc_overflow: impl FnMut(&mut Subfile) -> DhResult<u32>,
    mut free_overflow: impl FnMut(&mut Subfile, u32) -> DhResult<()>,
) -> DhResult<Option<DeleteOutcome>> {
    let Some(found) = find(primary, overflow, group_size_bytes, group_number, id, nocase)? else {
        return Ok(None);
    };
    let rec = RecordView::at(&found.buf, found.rec_off);
    let old_base_size = rec.next() as usize;
    let displaced_big_head = if rec.is_big_rec() { Some(rec.big_rec_head()) } else { None };

    delete_at(primary, overflow, group_size_bytes, group_number, found.loc, found.block_num, found.rec_off, &mut alloc_overflow, &mut free_overflow)?;

    Ok(Some(DeleteOutcome { old_base_size, displaced_big_head }))
}

/// Removes the record at `rec_off` in block `(block_loc, block_num)`,
/// then compacts per `spec.md` §4.6: if the block becomes empty and is
/// an overflow block, it is unlinked and freed; otherwise records are
/// pulled forward from the next overflow block while they fit, freeing
/// any source block that is fully drained.
fn delete_at(
    primary: &mut Subfile,
    overflow: &mut Subfile,
    group_size_bytes: u32,
    group_number: u32,
    block_loc: Loc,
    block_num: u32,
    rec_off: usize,
    alloc_overflow: &mut impl FnMut(&mut Subfile) -> DhResult<u32>,
    free_overflow: &mut impl FnMut(&mut Subfile, u32) -> DhResult<()>,
) -> DhResult<()> {
    let mut buf = vec![0u8; group_size_bytes as usize];
    read_block(primary, overflow, block_loc, block_num, group_size_bytes, &mut buf)?;

    let rec_len = RecordView::at(&buf, rec_off).next() as usize;
    let used = used_bytes(&buf) as usize;
    buf.copy_within(rec_off + rec_len..used, rec_off);
    let new_used = used - rec_len;
    buf[new_used..used].fill(0);
    set_used_bytes(&mut buf, new_used as u16);

    if block_loc == Loc::Overflow && new_used == BLOCK_HEADER_SIZE {
        let freed_next = next_link(&buf);
        relink_predecessor(primary, overflow, group_size_bytes, group_number, block_num, freed_next)?;
        mark_free(&mut buf);
        free_overflow(overflow, block_num)?;
        return Ok(());
    }

    compact_from_next(primary, overflow, group_size_bytes, group_number, block_loc, block_num, &mut buf, free_overflow)?;
    write_block(primary, overflow, block_loc, block_num, group_size_bytes, &buf)
}

fn mark_free(buf: &mut [u8]) {
    init_data_block(buf);
    let mut hdr = BlockHeader::read(buf);
    hdr.block_type = DHT_FREE;
    hdr.write(buf);
}

/// Finds the block whose `next` points at `target` (walking from the
/// group head) and repoints it at `new_next`.
fn relink_predecessor(
    primary: &mut Subfile,
    overflow: &mut Subfile,
    group_size_bytes: u32,
    group_number: u32,
    target: u32,
    new_next: u32,
) -> DhResult<()> {
    let mut loc = Loc::Primary;
    let mut num = group_number;
    let mut buf = vec![0u8; group_size_bytes as usize];
    loop {
        read_block(primary, overflow, loc, num, group_size_bytes, &mut buf)?;
        let next = next_link(&buf);
        if next == target {
            set_next_link(&mut buf, new_next);
            return write_block(primary, overflow, loc, num, group_size_bytes, &buf);
        }
        if next == 0 {
            return Err(DhError::structural(
                "overflow block not reachable from its group during compaction",
                ErrorContext::new().subfile(SubfileKind::Overflow).group(target),
            ));
        }
        loc = Loc::Overflow;
        num = next;
    }
}

/// Pulls whole records forward from the chain's next overflow block(s)
/// into `target_buf` while they fit, freeing any source block that is
/// fully drained, stopping at the first record that doesn't fit or when
/// the chain ends.
fn compact_from_next(
    primary: &mut Subfile,
    overflow: &mut Subfile,
    group_size_bytes: u32,
    group_number: u32,
    target_loc: Loc,
    target_num: u32,
    target_buf: &mut Vec<u8>,
    free_overflow: &mut impl FnMut(&mut Subfile, u32) -> DhResult<()>,
) -> DhResult<()> {
    loop {
        let next = next_link(target_buf);
        if next == 0 {
            return Ok(());
        }

        let mut src = vec![0u8; group_size_bytes as usize];
        overflow.read_group(next, &mut src, group_size_bytes as usize)?;
        validate_or_err(&src, group_size_bytes, Loc::Overflow, next)?;

        let mut src_off = BLOCK_HEADER_SIZE;
        let src_used = used_bytes(&src) as usize;
        let mut target_used = used_bytes(target_buf) as usize;

        while src_off < src_used {
            let rec_len = RecordView::at(&src, src_off).next() as usize;
            if rec_len == 0 {
                break;
            }
            if target_used + rec_len > group_size_bytes as usize {
                break;
            }
            target_buf[target_used..target_used + rec_len].copy_from_slice(&src[src_off..src_off + rec_len]);
            target_used += rec_len;
            src_off += rec_len;
        }
        set_used_bytes(target_buf, target_used as u16);

        if src_off >= src_used {
            // Source fully drained: unlink it and free it, keep going.
            let src_next = next_link(&src);
            set_next_link(target_buf, src_next);
            let mut freed = src;
            mark_free(&mut freed);
            free_overflow(overflow, next)?;
            let _ = (primary, group_number, target_loc, target_num);
            continue;
        }

        // Partial pull: persist the source with its remaining records
        // shifted down to the front, then stop.
        src.copy_within(src_off..src_used, BLOCK_HEADER_SIZE);
        let remaining = src_used - src_off;
        src[BLOCK_HEADER_SIZE + remaining..src_used].fill(0);
        set_used_bytes(&mut src, (BLOCK_HEADER_SIZE + remaining) as u16);
        overflow.write_group(next, &src, group_size_bytes as usize)?;
        return Ok(());
    }
}
