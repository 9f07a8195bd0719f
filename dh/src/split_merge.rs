//! Linear-hash resize: split and merge (`spec.md` §4.7).
//!
//! Locking (file-table lock, then new/target group lock, then source
//! group lock, `inhibit_count`) is the caller's job in `dh::handle`; this
//! module implements the re-hash-and-repack algorithm itself, transcribed
//! from `dh_split.c`'s `dh_split`/`dh_merge`.
//!
//! Block numbers are not preserved across a split or merge: every
//! overflow block touched by the reshuffled chains is freed and
//! replaced by freshly allocated ones as the records are packed into
//! their new homes. The original engine does the same thing (`dh_split.c`
//! packs into fresh in-memory buffers and only reuses a block number by
//! accident of allocation order); what must be preserved, and is, is the
//! full set of records and their payload bytes.

use crate::block::{init_data_block, next_link, set_next_link, set_used_bytes, used_bytes, BLOCK_HEADER_SIZE};
use crate::error::DhResult;
use crate::hash::dh_hash_group;
use crate::record::RecordView;
use crate::subfile::Subfile;

/// `DHLoad`: the load-factor percentage that drives split/merge
/// hysteresis (`spec.md` §4.7, "Supplemented features" #1).
pub fn dh_load(load_bytes: u64, group_size_bytes: u32, modulus: u32) -> u64 {
    if group_size_bytes == 0 || modulus == 0 {
        return 0;
    }
    (load_bytes * 100) / (group_size_bytes as u64 * modulus as u64)
}

pub fn should_split(load: u64, split_load: u16, modulus: u32, min_modulus: u32) -> bool {
    load > split_load as u64 || modulus < min_modulus
}

pub fn should_merge(load: u64, merge_load: u16, modulus: u32, min_modulus: u32) -> bool {
    load < merge_load as u64 && modulus > min_modulus
}

/// New `(modulus, mod_value, new_group, source_group)` for a split,
/// exactly per `spec.md` §4.7 step 1.
pub fn split_params(modulus: u32, mod_value: u32) -> (u32, u32, u32, u32) {
    let new_group = modulus + 1;
    let new_mod_value = if new_group > mod_value { mod_value * 2 } else { mod_value };
    let source_group = new_group - new_mod_value / 2;
    (new_group, new_mod_value, new_group, source_group)
}

/// New `(modulus, mod_value, source_group, target_group)` for a merge,
/// per `spec.md` §4.7 step 1.
pub fn merge_params(modulus: u32, mod_value: u32) -> (u32, u32, u32, u32) {
    let source_group = modulus;
    let new_modulus = modulus - 1;
    let target_group = source_group - mod_value / 2;
    let new_mod_value = if new_modulus == mod_value / 2 { mod_value / 2 } else { mod_value };
    (new_modulus, new_mod_value, source_group, target_group)
}

/// Reads every record out of the chain rooted at primary slot
/// `group_number`, returning the raw record bytes (unchanged: id, flags
/// and payload/chain-head all travel as-is since moving groups never
/// changes a record's encoded size) and the list of overflow block
/// numbers the chain used (the primary slot itself is not included;
/// callers either overwrite it in place or zero it explicitly).
fn collect_chain(primary: &mut Subfile, overflow: &mut Subfile, group_size_bytes: u32, group_number: u32) -> DhResult<(Vec<Vec<u8>>, Vec<u32>)> {
    let mut records = Vec::new();
    let mut blocks = Vec::new();

    let mut buf = vec![0u8; group_size_bytes as usize];
    primary.read_group(group_number, &mut buf, group_size_bytes as usize)?;
    loop {
        let used = used_bytes(&buf) as usize;
        let mut off = BLOCK_HEADER_SIZE;
        while off < used {
            let rec_len = RecordView::at(&buf, off).next() as usize;
            if rec_len == 0 {
                break;
            }
            records.push(buf[off..off + rec_len].to_vec());
            off += rec_len;
        }
        let next = next_link(&buf);
        if next == 0 {
            break;
        }
        blocks.push(next);
        overflow.read_group(next, &mut buf, group_size_bytes as usize)?;
    }

    Ok((records, blocks))
}

/// Writes `records` into the chain rooted at primary slot
/// `group_number`, starting from a fresh empty block and allocating
/// overflow blocks as each fills, exactly mirroring the append logic
/// `dh::group` uses for ordinary writes.
fn pack_chain(
    primary: &mut Subfile,
    overflow: &mut Subfile,
    group_size_bytes: u32,
    group_number: u32,
    records: &[Vec<u8>],
    mut alloc_overflow: impl FnMut(&mut Subfile) -> DhResult<u32>,
) -> DhResult<()> {
    let mut cur_is_primary = true;
    let mut cur_num = group_number;
    let mut buf = vec![0u8; group_size_bytes as usize];
    init_data_block(&mut buf);

    for rec in records {
        let used = used_bytes(&buf) as usize;
        if used + rec.len() > group_size_bytes as usize {
            let new_block = alloc_overflow(overflow)?;
            set_next_link(&mut buf, new_block);
            if cur_is_primary {
                primary.write_group(cur_num, &buf, group_size_bytes as usize)?;
            } else {
                overflow.write_group(cur_num, &buf, group_size_bytes as usize)?;
            }
            cur_is_primary = false;
            cur_num = new_block;
            init_data_block(&mut buf);
        }
        let used = used_bytes(&buf) as usize;
        buf[used..used + rec.len()].copy_from_slice(rec);
        set_used_bytes(&mut buf, (used + rec.len()) as u16);
    }

    if cur_is_primary {
        primary.write_group(cur_num, &buf, group_size_bytes as usize)?;
    } else {
        overflow.write_group(cur_num, &buf, group_size_bytes as usize)?;
    }
    Ok(())
}

fn free_blocks(overflow: &mut Subfile, group_size_bytes: u32, blocks: &[u32], mut free_overflow: impl FnMut(&mut Subfile, u32) -> DhResult<()>) -> DhResult<()> {
    let mut buf = vec![0u8; group_size_bytes as usize];
    for &b in blocks {
        init_data_block(&mut buf);
        overflow.write_group(b, &buf, group_size_bytes as usize)?;
        free_overflow(overflow, b)?;
    }
    Ok(())
}

/// Executes a split of `source_group` given the already-computed new
/// `(modulus, mod_value)` and the `new_group` it is splitting into
/// (`spec.md` §4.7 steps 2–3). Rehashes every record in the source
/// chain and repacks the two resulting chains.
pub fn execute_split(
    primary: &mut Subfile,
    overflow: &mut Subfile,
    group_size_bytes: u32,
    source_group: u32,
    new_group: u32,
    new_modulus: u32,
    new_mod_value: u32,
    nocase: bool,
    mut alloc_overflow: impl FnMut(&mut Subfile) -> DhResult<u32>,
    mut free_overflow: impl FnMut(&mut Subfile, u32) -> DhResult<()>,
) -> DhResult<()> {
    let (records, old_blocks) = collect_chain(primary, overflow, group_size_bytes, source_group)?;

    let mut stays = Vec::new();
    let mut moves = Vec::new();
    for rec in records {
        let view = RecordView::at(&rec, 0);
        let id = if nocase { crate::hash::fold_nocase(view.id()) } else { view.id().to_vec() };
        let g = dh_hash_group(&id, new_modulus, new_mod_value);
        if g == new_group {
            moves.push(rec);
        } else {
            stays.push(rec);
        }
    }

    pack_chain(primary, overflow, group_size_bytes, source_group, &stays, &mut alloc_overflow)?;
    pack_chain(primary, overflow, group_size_bytes, new_group, &moves, &mut alloc_overflow)?;
    free_blocks(overflow, group_size_bytes, &old_blocks, &mut free_overflow)
}

/// Executes a merge of `source_group` into `target_group` (`spec.md`
/// §4.7 steps 2–3 for merge): every record from both chains is repacked
/// into `target_group`'s chain, all old overflow blocks are freed, and
/// `source_group`'s primary slot is left as an empty data block.
pub fn execute_merge(
    primary: &mut Subfile,
    overflow: &mut Subfile,
    group_size_bytes: u32,
    source_group: u32,
    target_group: u32,
    mut alloc_overflow: impl FnMut(&mut Subfile) -> DhResult<u32>,
    mut free_overflow: impl FnMut(&mut Subfile, u32) -> DhResult<()>,
) -> DhResult<()> {
    let (mut records, mut old_blocks) = collect_chain(primary, overflow, group_size_bytes, target_group)?;
    let (source_records, source_blocks) = collect_chain(primary, overflow, group_size_bytes, source_group)?;
    records.extend(source_records);
    old_blocks.extend(source_blocks);

    pack_chain(primary, overflow, group_size_bytes, target_group, &records, &mut alloc_overflow)?;
    free_blocks(overflow, group_size_bytes, &old_blocks, &mut free_overflow)?;

    let mut empty = vec![0u8; group_size_bytes as usize];
    init_data_block(&mut empty);
    primary.write_group(source_group, &empty, group_size_bytes as usize)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_params_doubles_mod_value_at_power_of_two() {
        let (modulus, mod_value, new_group, source_group) = split_params(4, 4);
        assert_eq!(modulus, 5);
        assert_eq!(mod_value, 8);
        assert_eq!(new_group, 5);
        assert_eq!(source_group, 1);
    }

    #[test]
    fn merge_params_halves_mod_value_at_threshold() {
        let (modulus, mod_value, source_group, target_group) = merge_params(5, 8);
        assert_eq!(modulus, 4);
        assert_eq!(mod_value, 4);
        assert_eq!(source_group, 5);
        assert_eq!(target_group, 1);
    }

    #[test]
    fn dh_load_matches_formula() {
        assert_eq!(dh_load(512, 512, 1), 100);
        assert_eq!(dh_load(256, 512, 1), 50);
    }
}
