//! On-disk header layouts for the primary and overflow subfiles (`spec.md`
//! §3, §6).

use std::mem::size_of;
use std::slice;

use crate::consts::{DH_OVERFLOW, DH_PRIMARY, GROUP_MULTIPLIER, MAX_AKPATH_LEN};

/// Mutable runtime parameters of a DH file, embedded in the primary header
/// and mirrored in the in-memory `FileEntry` (`spec.md` §3, §6).
#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
pub struct Params {
    pub modulus: u32,
    pub min_modulus: u32,
    pub mod_value: u32,
    pub big_rec_size: u32,
    pub split_load: u16,
    pub merge_load: u16,
    pub load_bytes: u64,
    pub extended_load_bytes: u64,
    pub free_chain: u32,
    pub longest_id: u16,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            modulus: 1,
            min_modulus: 1,
            mod_value: 1,
            big_rec_size: 0,
            split_load: 0,
            merge_load: 0,
            load_bytes: 0,
            extended_load_bytes: 0,
            free_chain: 0,
            longest_id: 0,
        }
    }
}

/// Primary subfile header (`~0`). Occupies the first `group_size` bytes of
/// the file; groups 1..=modulus follow immediately after.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
pub struct PrimaryHeader {
    pub magic: u16,
    pub file_version: u8,
    pub flags_hi: u8,
    pub group_size: u32,
    pub params: Params,
    pub flags: u16,
    pub ak_map: u32,
    pub creation_timestamp: u64,
    pub record_count: u64,
    pub user_hash: u32,
    /// Relocated index directory (`spec.md` §6's `akpath`); empty means
    /// the index subfiles (`~2..~33`) live alongside the primary/overflow
    /// pair, per `dh_int.h`'s `DH_FILE.akpath` (Supplemented feature #7).
    /// NUL-padded, not necessarily NUL-terminated if it fills the buffer.
    pub akpath: [u8; MAX_AKPATH_LEN],
}

impl Default for PrimaryHeader {
    fn default() -> Self {
        Self {
            magic: DH_PRIMARY,
            file_version: 0,
            flags_hi: 0,
            group_size: GROUP_MULTIPLIER,
            params: Params::default(),
            flags: 0,
            ak_map: 0,
            creation_timestamp: 0,
            record_count: 0,
            user_hash: 0,
            akpath: [0u8; MAX_AKPATH_LEN],
        }
    }
}

impl PrimaryHeader {
    /// Reads the header out of the first `size_of::<Self>()` bytes of `buf`.
    ///
    /// # Safety
    /// `buf` must be at least `size_of::<Self>()` bytes.
    pub fn from_bytes(buf: &[u8]) -> Self {
        assert!(buf.len() >= size_of::<Self>());
        unsafe { (buf.as_ptr() as *const Self).read_unaligned() }
    }

    pub fn write_into(&self, buf: &mut [u8]) {
        assert!(buf.len() >= size_of::<Self>());
        let src = unsafe { slice::from_raw_parts(self as *const _ as *const u8, size_of::<Self>()) };
        buf[..size_of::<Self>()].copy_from_slice(src);
    }

    pub fn is_big_endian_magic(raw_magic: u16) -> bool {
        raw_magic.swap_bytes() == DH_PRIMARY
    }

    /// Reads `akpath` as a UTF-8 string, stopping at the first NUL.
    /// Empty means indices are not relocated.
    pub fn ak_path(&self) -> String {
        let end = self.akpath.iter().position(|&b| b == 0).unwrap_or(self.akpath.len());
        String::from_utf8_lossy(&self.akpath[..end]).into_owned()
    }

    /// Sets `akpath`, NUL-padding the rest of the buffer. Returns `false`
    /// if `path` is too long to fit.
    pub fn set_ak_path(&mut self, path: &str) -> bool {
        let bytes = path.as_bytes();
        if bytes.len() >= MAX_AKPATH_LEN {
            return false;
        }
        self.akpath = [0u8; MAX_AKPATH_LEN];
        self.akpath[..bytes.len()].copy_from_slice(bytes);
        true
    }
}

/// Overflow subfile header (`~1`). Blocks are addressed as a flat array of
/// `group_size`-byte slots after this header.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
pub struct OverflowHeader {
    pub magic: u16,
    pub _pad: u16,
    pub group_size: u32,
}

impl Default for OverflowHeader {
    fn default() -> Self {
        Self {
            magic: DH_OVERFLOW,
            _pad: 0,
            group_size: GROUP_MULTIPLIER,
        }
    }
}

impl OverflowHeader {
    pub fn from_bytes(buf: &[u8]) -> Self {
        assert!(buf.len() >= size_of::<Self>());
        unsafe { (buf.as_ptr() as *const Self).read_unaligned() }
    }

    pub fn write_into(&self, buf: &mut [u8]) {
        assert!(buf.len() >= size_of::<Self>());
        let src = unsafe { slice::from_raw_parts(self as *const _ as *const u8, size_of::<Self>()) };
        buf[..size_of::<Self>()].copy_from_slice(src);
    }
}

/// Every DH file's header occupies exactly one `group_size`-byte block,
/// regardless of version, padded out with zeroes.
pub fn header_bytes(group_size_bytes: u32) -> u32 {
    group_size_bytes
}
