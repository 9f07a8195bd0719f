//! Large-record (out-of-line) chain: write, read and free (`spec.md` §3,
//! §4.5 step 1, §4.8).
//!
//! The head block additionally stores the total payload length
//! (`data_len`). Per the Open Question resolved in `spec.md` §9, only the
//! head's `data_len` is authoritative for the *total*; every block's own
//! `used_bytes` is authoritative for *that block's* share, and a reader
//! consumes `min(remaining, used_bytes - header_len)` bytes at each step.

use crate::block::{next_link, used_bytes, BlockHeader, BLOCK_HEADER_SIZE};
use crate::consts::DHT_BIG_REC;
use crate::error::{DhError, DhResult, ErrorContext, Subfile as SubfileKind};
use crate::subfile::Subfile;

/// Size of the head block's header, including the `data_len` field.
pub const BIG_HEAD_HEADER_SIZE: usize = BLOCK_HEADER_SIZE + 4;

fn set_data_len(buf: &mut [u8], len: u32) {
    buf[BLOCK_HEADER_SIZE..BLOCK_HEADER_SIZE + 4].copy_from_slice(&len.to_ne_bytes());
}

fn get_data_len(buf: &[u8]) -> u32 {
    u32::from_ne_bytes(buf[BLOCK_HEADER_SIZE..BLOCK_HEADER_SIZE + 4].try_into().unwrap())
}

/// Writes `payload` across a chain of `BIG_REC` blocks in the overflow
/// subfile, allocating blocks via `alloc`. Returns the head block number.
pub fn write_chain(
    overflow: &mut Subfile,
    group_size_bytes: u32,
    payload: &[u8],
    mut alloc: impl FnMut(&mut Subfile) -> DhResult<u32>,
) -> DhResult<u32> {
    let head = alloc(overflow)?;
    let mut buf = vec![0u8; group_size_bytes as usize];
    let mut cur = head;
    let mut offset = 0usize;
    let mut first = true;
    loop {
        let header_len = if first { BIG_HEAD_HEADER_SIZE } else { BLOCK_HEADER_SIZE };
        let room = group_size_bytes as usize - header_len;
        let chunk = room.min(payload.len() - offset);
        buf.fill(0);
        let mut hdr = BlockHeader { used_bytes: (header_len + chunk) as u16, block_type: DHT_BIG_REC, _pad: 0, next: 0 };
        let next_needed = offset + chunk < payload.len();
        let next_block = if next_needed { alloc(overflow)? } else { 0 };
        hdr.next = next_block;
        hdr.write(&mut buf);
        if first {
            set_data_len(&mut buf, payload.len() as u32);
        }
        buf[header_len..header_len + chunk].copy_from_slice(&payload[offset..offset + chunk]);
        overflow.write_group(cur, &buf, group_size_bytes as usize)?;

        offset += chunk;
        if !next_needed {
            break;
        }
        cur = next_block;
        first = false;
    }
    Ok(head)
}

/// Reads the full payload of a large-record chain starting at `head`.
pub fn read_chain(overflow: &mut Subfile, group_size_bytes: u32, head: u32) -> DhResult<Vec<u8>> {
    let mut buf = vec![0u8; group_size_bytes as usize];
    overflow.read_group(head, &mut buf, group_size_bytes as usize)?;
    if !validate_big(&buf, group_size_bytes) {
        return Err(DhError::structural(
            "invalid big-record head block",
            ErrorContext::new().subfile(SubfileKind::Overflow).group(head),
        ));
    }
    let total = get_data_len(&buf) as usize;
    let mut out = Vec::with_capacity(total);

    let mut cur = head;
    let mut first = true;
    loop {
        if !first {
            overflow.read_group(cur, &mut buf, group_size_bytes as usize)?;
            if !validate_big(&buf, group_size_bytes) {
                return Err(DhError::structural(
                    "invalid big-record continuation block",
                    ErrorContext::new().subfile(SubfileKind::Overflow).group(cur),
                ));
            }
        }
        let header_len = if first { BIG_HEAD_HEADER_SIZE } else { BLOCK_HEADER_SIZE };
        let avail = used_bytes(&buf) as usize - header_len;
        let remaining = total - out.len();
        let take = avail.min(remaining);
        out.extend_from_slice(&buf[header_len..header_len + take]);

        let next = next_link(&buf);
        if next == 0 || out.len() >= total {
            break;
        }
        cur = next;
        first = false;
    }
    Ok(out)
}

fn validate_big(buf: &[u8], group_size_bytes: u32) -> bool {
    let hdr = BlockHeader::read(buf);
    hdr.block_type == DHT_BIG_REC && hdr.used_bytes as u32 <= group_size_bytes && hdr.used_bytes as usize >= BLOCK_HEADER_SIZE
}

/// Walks a large-record chain and hands each block to `free_one` (which is
/// expected to thread it onto the free chain), per `spec.md` §4.8: "Big
/// record release reads the chain ... and links it wholesale into the free
/// chain at the end."
pub fn free_chain(
    overflow: &mut Subfile,
    group_size_bytes: u32,
    head: u32,
    mut free_one: impl FnMut(&mut Subfile, u32) -> DhResult<()>,
) -> DhResult<()> {
    let mut buf = vec![0u8; group_size_bytes as usize];
    let mut cur = head;
    loop {
        overflow.read_group(cur, &mut buf, group_size_bytes as usize)?;
        let next = next_link(&buf);
        free_one(overflow, cur)?;
        if next == 0 {
            break;
        }
        cur = next;
    }
    Ok(())
}

