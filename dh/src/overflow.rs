//! Overflow-subfile free-block chain: `get_overflow`/`free_overflow`
//! (`spec.md` §4.8, grounded on `dh_get_overflow`/`dh_free_overflow` in
//! `dh_int.h`/`dh_split.c`).
//!
//! The free chain's head block number lives in the primary header
//! (`free_chain`, guarded by the header/group-0 lock); callers pass it in
//! and get the updated value back so they can persist it under the same
//! lock that protected the read.

use crate::block::{init_data_block, next_link, set_next_link};
use crate::error::DhResult;
use crate::subfile::Subfile;

/// Pops a block off the free chain if one is available, otherwise appends
/// a fresh block to the end of the overflow subfile. Returns the block
/// number and the free chain's new head.
pub fn get_overflow(overflow: &mut Subfile, group_size_bytes: u32, free_chain_head: u32) -> DhResult<(u32, u32)> {
    if free_chain_head != 0 {
        let mut buf = vec![0u8; group_size_bytes as usize];
        overflow.read_group(free_chain_head, &mut buf, group_size_bytes as usize)?;
        let next = next_link(&buf);
        init_data_block(&mut buf);
        overflow.write_group(free_chain_head, &buf, group_size_bytes as usize)?;
        return Ok((free_chain_head, next));
    }

    let block_count = overflow.block_count()?;
    let new_block = block_count + 1;
    let mut buf = vec![0u8; group_size_bytes as usize];
    init_data_block(&mut buf);
    overflow.append_raw(&buf)?;
    Ok((new_block, 0))
}

/// Threads `block` onto the head of the free chain. Returns the new head
/// (always `block`).
pub fn free_overflow(overflow: &mut Subfile, group_size_bytes: u32, block: u32, free_chain_head: u32) -> DhResult<u32> {
    let mut buf = vec![0u8; group_size_bytes as usize];
    init_data_block(&mut buf);
    set_next_link(&mut buf, free_chain_head);
    overflow.write_group(block, &buf, group_size_bytes as usize)?;
    Ok(block)
}
