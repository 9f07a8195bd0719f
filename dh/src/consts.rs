//! On-disk constants shared across the header, block and record layouts.
//!
//! Several of these (in particular the exact `dh_hash_group` mixing
//! function and the precise header byte layout) were not recoverable from
//! the filtered original source kept in this pack — see `DESIGN.md` for the
//! Open Questions this resolves and the reasoning behind each default.

/// Bytes per unit of `group_size`. A file's `group_size` parameter is a
/// small multiplier of this; `group_size_bytes = group_size * GROUP_MULTIPLIER`.
pub const GROUP_MULTIPLIER: u32 = 512;

/// Largest `group_size` multiplier a file may be created with. Chosen so
/// that `group_size_bytes` always fits in the `u16` `used_bytes`/`next`
/// fields of the block and record headers (§6).
pub const MAX_GROUP_SIZE: u16 = 120;

/// Current on-disk format version understood by this engine.
pub const DH_VERSION: u8 = 2;

/// Primary subfile magic (host-endian file).
pub const DH_PRIMARY: u16 = 0x4448; // "DH"
/// Overflow subfile magic (host-endian file).
pub const DH_OVERFLOW: u16 = 0x4448 ^ 0x0101;
/// Transient magic written while an endian conversion is in progress.
pub const DH_CONVERTING: u16 = 0xC0DE;

/// Block type: ordinary in-group data block.
pub const DHT_DATA: u8 = 1;
/// Block type: head (or continuation) of a large-record chain.
pub const DHT_BIG_REC: u8 = 2;
/// Block type: on the free chain, awaiting reuse.
pub const DHT_FREE: u8 = 3;

/// Record flag bit: record's payload lives in a large-record chain.
pub const REC_BIG_REC: u8 = 0x01;

/// File flag bit: ids are matched case-insensitively (folded to upper case).
pub const DHF_NOCASE: u16 = 0x0001;
/// File flag bit: AK (secondary index) subfiles are present.
pub const DHF_AK: u16 = 0x0002;
/// File flag bit: the file never splits/merges (fixed group count).
pub const DHF_NO_RESIZE: u16 = 0x0004;

/// Default group-size multiplier when `create_file` is asked for `-1`.
pub const DEFAULT_GROUP_SIZE: u16 = 1;
/// Default minimum modulus when `create_file` is asked for `-1`.
pub const DEFAULT_MIN_MODULUS: u32 = 1;
/// Default merge-load threshold (%).
pub const DEFAULT_MERGE_LOAD: u16 = 50;
/// Default split-load threshold (%).
pub const DEFAULT_SPLIT_LOAD: u16 = 80;

/// Version-1 files must not exceed this primary-subfile size.
pub const VERSION_1_SIZE_LIMIT: u64 = 0x8000_0000;

/// Maximum id length in bytes (fits in the record header's `id_len: u8`).
pub const MAX_ID_LEN: usize = 255;

/// Maximum length of a relocated index directory path stored in the
/// primary header's `akpath` field (`qmidx.c`'s `MAX_PATHNAME_LEN`).
pub const MAX_AKPATH_LEN: usize = 256;

/// Number of AK (alternate-index) slots the `ak_map` bitmask can track,
/// one bit per index subfile `~2..~33` (`spec.md` §6).
pub const MAX_INDICES: u32 = 32;

/// Subfile number of the first index subfile (`~2`), i.e. `AK_BASE_SUBFILE`.
pub const AK_BASE_SUBFILE: u8 = 2;
