//! Block header layout and raw buffer helpers (`spec.md` §3, §6).
//!
//! A "block" here is a `group_size`-byte buffer, whether it is the first
//! block of a group (in the primary subfile) or an overflow/big-record
//! block (in the overflow subfile). Callers own the buffer; this module
//! only knows how to read and patch the fixed header at its front.

use std::mem::size_of;

use crate::consts::{DHT_BIG_REC, DHT_DATA, DHT_FREE};

#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
pub struct BlockHeader {
    pub used_bytes: u16,
    pub block_type: u8,
    pub _pad: u8,
    pub next: u32,
}

/// Size in bytes of [`BlockHeader`]; records in a DATA block start here.
pub const BLOCK_HEADER_SIZE: usize = size_of::<BlockHeader>();

impl BlockHeader {
    pub fn read(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= BLOCK_HEADER_SIZE);
        unsafe { (buf.as_ptr() as *const Self).read_unaligned() }
    }

    pub fn write(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= BLOCK_HEADER_SIZE);
        unsafe {
            (buf.as_mut_ptr() as *mut Self).write_unaligned(*self);
        }
    }
}

/// Initializes `buf` (which must be `group_size_bytes` long) as an empty
/// DATA block: header only, rest zero-filled.
pub fn init_data_block(buf: &mut [u8]) {
    buf.fill(0);
    BlockHeader {
        used_bytes: BLOCK_HEADER_SIZE as u16,
        block_type: DHT_DATA,
        _pad: 0,
        next: 0,
    }
    .write(buf);
}

pub fn used_bytes(buf: &[u8]) -> u16 {
    BlockHeader::read(buf).used_bytes
}

pub fn block_type(buf: &[u8]) -> u8 {
    BlockHeader::read(buf).block_type
}

pub fn set_used_bytes(buf: &mut [u8], n: u16) {
    let mut hdr = BlockHeader::read(buf);
    hdr.used_bytes = n;
    hdr.write(buf);
}

pub fn next_link(buf: &[u8]) -> u32 {
    BlockHeader::read(buf).next
}

pub fn set_next_link(buf: &mut [u8], next: u32) {
    let mut hdr = BlockHeader::read(buf);
    hdr.next = next;
    hdr.write(buf);
}

/// Validates a block header read off disk, per the structural-error check
/// repeated at every call site in the original engine (`dh_write.c`,
/// `dh_split.c`, `analyse.c`): `0 < used_bytes <= group_size` and a known
/// `block_type`.
pub fn validate(buf: &[u8], group_size_bytes: u32) -> bool {
    let hdr = BlockHeader::read(buf);
    let used = hdr.used_bytes as u32;
    if used == 0 || used > group_size_bytes {
        return false;
    }
    matches!(hdr.block_type, DHT_DATA | DHT_BIG_REC | DHT_FREE)
}
