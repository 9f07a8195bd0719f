//! End-to-end scenario tests transcribed from `spec.md` §8's literal
//! end-to-end scenarios and round-trip laws.

use std::path::Path;

use dh::{create_file, create_file_default, Handle};

fn open_fresh(dir: &Path) -> Handle {
    create_file_default(dir, 0).unwrap();
    Handle::open(dir).unwrap()
}

/// Scenario 1: create+read-back.
#[test]
fn create_and_read_back() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("F");
    let h = open_fresh(&dir);

    h.write(b"K1", b"hello").unwrap();
    assert_eq!(h.read(b"K1").unwrap(), Some(b"hello".to_vec()));
    assert!(!h.exists(b"K2").unwrap());
}

/// Scenario 2: overwrite shrinks load.
#[test]
fn overwrite_shrinks_load() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("F");
    let h = open_fresh(&dir);

    h.write(b"K1", &vec![b'x'; 300]).unwrap();
    let load1 = h.analyse().unwrap().total_record_bytes;

    h.write(b"K1", b"y").unwrap();
    let load2 = h.analyse().unwrap().total_record_bytes;

    assert!(load2 < load1, "load2={} load1={}", load2, load1);
    assert_eq!(h.read(b"K1").unwrap(), Some(b"y".to_vec()));
}

/// Scenario 3: big record.
#[test]
fn big_record_round_trip_and_free() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("F");
    create_file(&dir, 2, 1, 200, 25, 80, 0, 2).unwrap();
    let h = Handle::open(&dir).unwrap();

    let payload = vec![b'a'; 4096];
    h.write(b"B", &payload).unwrap();
    assert_eq!(h.read(b"B").unwrap(), Some(payload));

    let analysis = h.analyse().unwrap();
    assert_eq!(analysis.large_record_count, 1);

    assert!(h.delete(b"B").unwrap());
    assert!(!h.exists(b"B").unwrap());
    let analysis = h.analyse().unwrap();
    assert_eq!(analysis.large_record_count, 0);
}

/// Scenario 4: analyse.
#[test]
fn analyse_counts_non_numeric_ids() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("F");
    create_file(&dir, 1, 4, 0, 25, 80, 0, 2).unwrap();
    let h = Handle::open(&dir).unwrap();

    for i in 0..100 {
        let id = format!("K{:03}", i);
        h.write(id.as_bytes(), &vec![0u8; 16]).unwrap();
    }

    let a = h.analyse().unwrap();
    assert_eq!(a.record_count, 100);
    assert_eq!(a.non_numeric_ids, 100);
    assert_eq!(a.hist.iter().sum::<u64>(), 100);
}

/// `record_count` counts only non-large records, while `large_record_count`
/// counts only large ones, so a mixed set adds up across both, not either
/// counted twice or the large ones missing from neither.
#[test]
fn analyse_record_count_excludes_large_records() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("F");
    create_file(&dir, 2, 1, 200, 25, 80, 0, 2).unwrap();
    let h = Handle::open(&dir).unwrap();

    for i in 0..10 {
        h.write(format!("S{:03}", i).as_bytes(), b"small").unwrap();
    }
    for i in 0..3 {
        h.write(format!("B{:03}", i).as_bytes(), &vec![b'a'; 4096]).unwrap();
    }

    let a = h.analyse().unwrap();
    assert_eq!(a.record_count, 10);
    assert_eq!(a.large_record_count, 3);
}

/// Scenario 5: split then merge round trip, every surviving key readable
/// throughout.
#[test]
fn split_then_merge_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("F");
    create_file(&dir, 1, 1, 0, 25, 50, 0, 2).unwrap();
    let h = Handle::open(&dir).unwrap();

    let mut written = Vec::new();
    let mut n = 0;
    loop {
        let id = format!("REC{:05}", n);
        let val = format!("value-{}", n).into_bytes();
        h.write(id.as_bytes(), &val).unwrap();
        written.push((id, val));
        n += 1;

        for (id, val) in &written {
            assert_eq!(h.read(id.as_bytes()).unwrap().as_ref(), Some(val));
        }

        if h.analyse().unwrap().modulus >= 4 {
            break;
        }
        assert!(n < 5000, "modulus never reached 4");
    }

    while h.analyse().unwrap().modulus > 1 {
        let (id, _) = written.pop().expect("ran out of keys before modulus==1");
        assert!(h.delete(id.as_bytes()).unwrap());

        for (id, val) in &written {
            assert_eq!(h.read(id.as_bytes()).unwrap().as_ref(), Some(val));
        }
    }

    assert_eq!(h.analyse().unwrap().modulus, 1);
}

/// `write(id, v); delete(id); exists(id) == false`, for a variety of
/// value lengths including empty and big-record-sized.
#[test]
fn write_delete_exists_law() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("F");
    create_file(&dir, 2, 1, 200, 25, 80, 0, 2).unwrap();
    let h = Handle::open(&dir).unwrap();

    for len in [0usize, 1, 199, 200, 4096] {
        let id = format!("V{}", len);
        let val = vec![b'z'; len];
        h.write(id.as_bytes(), &val).unwrap();
        assert_eq!(h.read(id.as_bytes()).unwrap(), Some(val));
        assert!(h.delete(id.as_bytes()).unwrap());
        assert!(!h.exists(id.as_bytes()).unwrap());
    }
}

/// `clear(); record_count == 0 ∧ modulus == min_modulus`.
#[test]
fn clear_resets_to_min_modulus() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("F");
    create_file(&dir, 1, 1, 0, 25, 50, 0, 2).unwrap();
    let h = Handle::open(&dir).unwrap();

    for i in 0..50 {
        h.write(format!("K{:03}", i).as_bytes(), b"value").unwrap();
    }
    assert!(h.analyse().unwrap().modulus > 1);

    h.clear().unwrap();
    let a = h.analyse().unwrap();
    assert_eq!(a.record_count, 0);
    assert_eq!(a.modulus, 1);
    assert!(!h.exists(b"K000").unwrap());
}

/// Scenario 6: endian round trip (native -> foreign -> native, the
/// "B -> L -> B" of §8 read from whichever endian this machine natively
/// is), readable again once back at the starting endian.
#[test]
fn endian_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("F");
    create_file(&dir, 1, 1, 0, 25, 80, 0, 2).unwrap();
    {
        let h = Handle::open(&dir).unwrap();
        h.write(b"K1", b"hello").unwrap();
        h.write(b"K2", &vec![b'x'; 100]).unwrap();
    }

    let foreign = if cfg!(target_endian = "big") { dh::ConvertTarget::Little } else { dh::ConvertTarget::Big };
    dh::convert_file(&dir, foreign).unwrap();
    dh::convert_file(&dir, dh::ConvertTarget::Native).unwrap();

    let h = Handle::open(&dir).unwrap();
    assert_eq!(h.read(b"K1").unwrap(), Some(b"hello".to_vec()));
    assert_eq!(h.read(b"K2").unwrap(), Some(vec![b'x'; 100]));
}

/// Converting to the file's own endian is a no-op: the file stays open
/// and readable afterwards.
#[test]
fn convert_to_native_is_a_no_op() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("F");
    create_file(&dir, 1, 1, 0, 25, 80, 0, 2).unwrap();
    {
        let h = Handle::open(&dir).unwrap();
        h.write(b"K1", b"hello").unwrap();
    }

    dh::convert_file(&dir, dh::ConvertTarget::Native).unwrap();

    let h = Handle::open(&dir).unwrap();
    assert_eq!(h.read(b"K1").unwrap(), Some(b"hello".to_vec()));
}
