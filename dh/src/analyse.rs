//! File statistics: `analyse` (`spec.md` §6, §8 scenario 4), grounded on
//! `analyse.c` and the degenerate-default/histogram rules recorded as
//! "Supplemented features" in `SPEC_FULL.md`.

use crate::block::{next_link, used_bytes, BLOCK_HEADER_SIZE};
use crate::consts::DHT_BIG_REC;
use crate::error::DhResult;
use crate::record::RecordView;
use crate::subfile::Subfile;

/// The 31-field statistics snapshot `spec.md` §6 describes as a CSV row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub modulus: u32,
    pub empty_groups: u32,
    pub overflowed_groups: u32,
    pub badly_overflowed_groups: u32,
    pub min_bytes_per_group: u64,
    pub max_bytes_per_group: u64,
    pub smallest_group: u32,
    pub largest_group: u32,
    pub total_blocks: u64,
    pub min_recs_per_group: u64,
    pub max_recs_per_group: u64,
    pub record_count: u64,
    pub large_record_count: u64,
    pub smallest_record: u64,
    pub largest_record: u64,
    pub total_record_bytes: u64,
    pub smallest_lrg_record: u64,
    pub largest_lrg_record: u64,
    pub total_lrg_record_bytes: u64,
    pub hist: [u64; 11],
    pub non_numeric_ids: u64,
}

impl Analysis {
    /// Renders the 31-field CSV row `spec.md` §6 names (`hist[0..=10]`
    /// expanding to 11 columns).
    pub fn to_csv(&self) -> String {
        let mut fields: Vec<String> = vec![
            self.modulus.to_string(),
            self.empty_groups.to_string(),
            self.overflowed_groups.to_string(),
            self.badly_overflowed_groups.to_string(),
            self.min_bytes_per_group.to_string(),
            self.max_bytes_per_group.to_string(),
            self.smallest_group.to_string(),
            self.largest_group.to_string(),
            self.total_blocks.to_string(),
            self.min_recs_per_group.to_string(),
            self.max_recs_per_group.to_string(),
            self.record_count.to_string(),
            self.large_record_count.to_string(),
            self.smallest_record.to_string(),
            self.largest_record.to_string(),
            self.total_record_bytes.to_string(),
            self.smallest_lrg_record.to_string(),
            self.largest_lrg_record.to_string(),
            self.total_lrg_record_bytes.to_string(),
        ];
        fields.extend(self.hist.iter().map(|h| h.to_string()));
        fields.push(self.non_numeric_ids.to_string());
        fields.join(",")
    }
}

/// A block's worth of records pulled apart for tallying, without
/// re-reading the block.
struct GroupTally {
    bytes: u64,
    recs: u64,
    blocks: u64,
}

fn is_numeric_id(id: &[u8]) -> bool {
    // "Non-numeric the moment any byte is not an ASCII digit" —
    // Supplemented feature #3, reproduced verbatim from `analyse.c`'s
    // `IsDigit` scan rather than a full numeric parse.
    !id.is_empty() && id.iter().all(|b| b.is_ascii_digit())
}

fn hist_bucket(len: u64) -> usize {
    for i in 0..10 {
        if len <= (16u64 << i) {
            return i;
        }
    }
    10
}

/// Walks every group's chain and produces the full statistics snapshot.
pub fn analyse(primary: &mut Subfile, overflow: &mut Subfile, group_size_bytes: u32, modulus: u32) -> DhResult<Analysis> {
    let mut a = Analysis { modulus, ..Default::default() };
    let mut min_bytes = u64::MAX;
    let mut max_bytes = 0u64;
    let mut min_recs = u64::MAX;
    let mut max_recs = 0u64;
    let mut smallest_group = u32::MAX;
    let mut largest_group = 0u32;

    for group_number in 1..=modulus {
        let tally = analyse_group(primary, overflow, group_size_bytes, group_number, &mut a)?;

        a.total_blocks += tally.blocks;
        if tally.recs == 0 {
            a.empty_groups += 1;
        }
        if tally.blocks == 2 {
            a.overflowed_groups += 1;
        } else if tally.blocks >= 3 {
            a.badly_overflowed_groups += 1;
        }

        if tally.bytes < min_bytes {
            min_bytes = tally.bytes;
            smallest_group = group_number;
        }
        if tally.bytes > max_bytes {
            max_bytes = tally.bytes;
            largest_group = group_number;
        }
        min_recs = min_recs.min(tally.recs);
        max_recs = max_recs.max(tally.recs);
    }

    // Supplemented feature #2: degenerate defaults reset LONG_MAX-style
    // sentinels back to 0 rather than reporting them, when there were no
    // groups or no records to measure.
    a.min_bytes_per_group = if min_bytes == u64::MAX { 0 } else { min_bytes };
    a.max_bytes_per_group = max_bytes;
    a.smallest_group = if smallest_group == u32::MAX { 0 } else { smallest_group };
    a.largest_group = largest_group;
    a.min_recs_per_group = if min_recs == u64::MAX { 0 } else { min_recs };
    a.max_recs_per_group = max_recs;

    // `smallest_record`/`smallest_lrg_record` are accumulated directly in
    // `analyse_group` and already default to 0 (the degenerate value)
    // when no record of that kind was ever seen.
    Ok(a)
}

fn analyse_group(primary: &mut Subfile, overflow: &mut Subfile, group_size_bytes: u32, group_number: u32, acc: &mut Analysis) -> DhResult<GroupTally> {
    let mut tally = GroupTally { bytes: 0, recs: 0, blocks: 0 };
    let mut buf = vec![0u8; group_size_bytes as usize];
    primary.read_group(group_number, &mut buf, group_size_bytes as usize)?;

    loop {
        tally.blocks += 1;
        let used = used_bytes(&buf) as usize;
        tally.bytes += used as u64;

        let mut off = BLOCK_HEADER_SIZE;
        while off < used {
            let rec = RecordView::at(&buf, off);
            let rec_len = rec.next() as usize;
            if rec_len == 0 {
                break;
            }
            tally.recs += 1;
            if !is_numeric_id(rec.id()) {
                acc.non_numeric_ids += 1;
            }

            if rec.is_big_rec() {
                acc.large_record_count += 1;
                // Supplemented feature #4: a big record's histogram and
                // size tallies use the in-group header cost plus the full
                // chain payload length, not the payload alone.
                let payload_len = big_rec_payload_len(overflow, group_size_bytes, rec.big_rec_head())?;
                let total = rec_len as u64 + payload_len;
                acc.total_lrg_record_bytes += total;
                if acc.smallest_lrg_record == 0 || total < acc.smallest_lrg_record {
                    acc.smallest_lrg_record = total;
                }
                acc.largest_lrg_record = acc.largest_lrg_record.max(total);
                acc.hist[hist_bucket(total)] += 1;
            } else {
                acc.record_count += 1;
                let total = rec_len as u64;
                acc.total_record_bytes += total;
                if acc.smallest_record == 0 || total < acc.smallest_record {
                    acc.smallest_record = total;
                }
                acc.largest_record = acc.largest_record.max(total);
                acc.hist[hist_bucket(total)] += 1;
            }

            off += rec_len;
        }

        let next = next_link(&buf);
        if next == 0 {
            break;
        }
        overflow.read_group(next, &mut buf, group_size_bytes as usize)?;
    }

    Ok(tally)
}

fn big_rec_payload_len(overflow: &mut Subfile, group_size_bytes: u32, head: u32) -> DhResult<u64> {
    let mut buf = vec![0u8; group_size_bytes as usize];
    overflow.read_group(head, &mut buf, group_size_bytes as usize)?;
    const BIG_HEAD_DATA_LEN_OFFSET: usize = crate::bigrec::BIG_HEAD_HEADER_SIZE - 4;
    Ok(u32::from_ne_bytes(buf[BIG_HEAD_DATA_LEN_OFFSET..BIG_HEAD_DATA_LEN_OFFSET + 4].try_into().unwrap()) as u64)
}
