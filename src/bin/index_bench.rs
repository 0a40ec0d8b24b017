//! Index build comparison: three ways to construct the same B+ tree.
//!
//! Usage:
//!   index_bench [record_count] [--bufs N]
//!
//! Method 1 scans an existing record file and inserts every key in file
//! order; method 2 grows file and index together, one record at a time;
//! method 3 hands the whole entry set to the bottom-up bulk loader. All
//! three are verified by point lookups afterwards.

use paged_storage::{
    Index, PagedFileManager, RecordFile, Result, ScanOp, StudentRecord, DEFAULT_BUF_CAPACITY,
};
use std::fs;
use std::process::exit;
use std::time::Instant;

const ATTR_LEN: usize = 20;
const DEFAULT_RECORDS: usize = 5000;

struct MethodStats {
    name: &'static str,
    seconds: f64,
    records: usize,
}

fn main() {
    env_logger::init();

    let mut records = DEFAULT_RECORDS;
    let mut bufs = DEFAULT_BUF_CAPACITY;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bufs" => match args.next().and_then(|v| v.parse().ok()) {
                Some(n) if n > 0 => bufs = n,
                _ => usage(),
            },
            "--help" | "-h" => usage(),
            other => match other.parse() {
                Ok(n) if n > 0 => records = n,
                _ => usage(),
            },
        }
    }

    if let Err(e) = run(records, bufs) {
        eprintln!("ERROR: {e}");
        exit(1);
    }
}

fn usage() -> ! {
    eprintln!("Usage: index_bench [record_count] [--bufs N]");
    exit(1);
}

fn run(records: usize, bufs: usize) -> Result<()> {
    let mut mgr = PagedFileManager::new(bufs);
    let entries = make_entries(records);
    println!("Comparing index builds over {records} records\n");

    let stats = [
        method1_scan_existing(&mut mgr, &entries)?,
        method2_interleaved(&mut mgr, &entries)?,
        method3_bulk_load(&mut mgr, &entries)?,
    ];

    print_comparison(&stats);
    Ok(())
}

/// Shuffled `(key, rec_id)` pairs, the arrival order for methods 1 and 2.
fn make_entries(count: usize) -> Vec<(Vec<u8>, i32)> {
    let mut entries: Vec<(Vec<u8>, i32)> = (0..count)
        .map(|i| {
            let roll = format!("CS24B{i:06}");
            (format!("{:<width$}", roll, width = ATTR_LEN).into_bytes(), i as i32)
        })
        .collect();

    // Fisher-Yates with a fixed xorshift stream keeps runs repeatable.
    let mut state = 0x853C49E6748FEA9Bu64;
    for i in (1..entries.len()).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        entries.swap(i, (state % (i as u64 + 1)) as usize);
    }
    entries
}

fn student_for(key: &[u8], i: i32) -> StudentRecord {
    StudentRecord {
        roll_no: String::from_utf8_lossy(key).trim_end().to_string(),
        name: format!("Student {i}"),
        batch: "2024".into(),
        degree: "BTech".into(),
        dept: "CSE".into(),
        join_yr: 2024,
        ..StudentRecord::default()
    }
}

/// Method 1: the record file already holds everything; scan it once and
/// insert each key into a fresh index.
fn method1_scan_existing(
    mgr: &mut PagedFileManager,
    entries: &[(Vec<u8>, i32)],
) -> Result<MethodStats> {
    println!("Method 1: bulk creation over an existing file");
    let _ = fs::remove_file("method1.rf");
    RecordFile::create(mgr, "method1.rf")?;
    let mut file = RecordFile::open(mgr, "method1.rf")?;
    for (key, i) in entries {
        file.insert(mgr, &student_for(key, *i))?;
    }

    let _ = fs::remove_file("method1.0");
    Index::create(mgr, "method1", 0, ATTR_LEN)?;
    let mut index = Index::open(mgr, "method1", 0)?;
    mgr.reset_stats();

    let start = Instant::now();
    let mut scan = file.scan(mgr)?;
    while let Some((record, rid)) = scan.next(mgr)? {
        let key = format!("{:<width$}", record.roll_no, width = ATTR_LEN).into_bytes();
        index.insert_entry(mgr, &key, rid.pack())?;
    }
    let seconds = start.elapsed().as_secs_f64();

    verify(mgr, &index, entries.len())?;
    mgr.print_stats();
    index.close(mgr)?;
    file.close(mgr)?;
    Ok(MethodStats {
        name: "scan existing file",
        seconds,
        records: entries.len(),
    })
}

/// Method 2: empty file and empty index, every arriving record goes into
/// both before the next one arrives.
fn method2_interleaved(
    mgr: &mut PagedFileManager,
    entries: &[(Vec<u8>, i32)],
) -> Result<MethodStats> {
    println!("Method 2: incremental build, record by record");
    let _ = fs::remove_file("method2.rf");
    let _ = fs::remove_file("method2.0");
    RecordFile::create(mgr, "method2.rf")?;
    let mut file = RecordFile::open(mgr, "method2.rf")?;
    Index::create(mgr, "method2", 0, ATTR_LEN)?;
    let mut index = Index::open(mgr, "method2", 0)?;
    mgr.reset_stats();

    let start = Instant::now();
    for (key, i) in entries {
        let rid = file.insert(mgr, &student_for(key, *i))?;
        index.insert_entry(mgr, key, rid.pack())?;
    }
    let seconds = start.elapsed().as_secs_f64();

    verify(mgr, &index, entries.len())?;
    mgr.print_stats();
    index.close(mgr)?;
    file.close(mgr)?;
    Ok(MethodStats {
        name: "interleaved inserts",
        seconds,
        records: entries.len(),
    })
}

/// Method 3: hand the whole sorted set to the bottom-up loader; no
/// insert_entry calls, no splits, each page written once.
fn method3_bulk_load(
    mgr: &mut PagedFileManager,
    entries: &[(Vec<u8>, i32)],
) -> Result<MethodStats> {
    println!("Method 3: sorted bottom-up bulk-load");
    let _ = fs::remove_file("method3.0");
    Index::create(mgr, "method3", 0, ATTR_LEN)?;
    let mut index = Index::open(mgr, "method3", 0)?;
    mgr.reset_stats();

    let start = Instant::now();
    index.bulk_load(mgr, entries.to_vec())?;
    let seconds = start.elapsed().as_secs_f64();

    println!(
        "  height {} with root at page {}",
        index.height(),
        index.root_page()
    );
    verify(mgr, &index, entries.len())?;
    mgr.print_stats();
    index.close(mgr)?;
    Ok(MethodStats {
        name: "bottom-up bulk-load",
        seconds,
        records: entries.len(),
    })
}

/// Spot-check lookups and confirm full ordered coverage via a scan.
fn verify(mgr: &mut PagedFileManager, index: &Index, count: usize) -> Result<()> {
    for i in (0..count).step_by((count / 50).max(1)) {
        let roll = format!("CS24B{i:06}");
        let key = format!("{:<width$}", roll, width = ATTR_LEN).into_bytes();
        let found = index.search(mgr, &key)?;
        if found.is_empty() {
            eprintln!("ERROR: key {roll} missing from index");
            exit(1);
        }
    }

    let mut scan = index.open_scan(mgr, ScanOp::Every, b"")?;
    let mut seen = 0usize;
    let mut last: Option<Vec<u8>> = None;
    while let Some((key, _)) = scan.find_next(index, mgr)? {
        if let Some(prev) = &last {
            if *prev > key {
                eprintln!("ERROR: index scan out of order");
                exit(1);
            }
        }
        last = Some(key);
        seen += 1;
    }
    if seen != count {
        eprintln!("ERROR: index scan saw {seen} of {count} entries");
        exit(1);
    }
    println!("  verified: {count} entries, ordered scan intact");
    Ok(())
}

fn print_comparison(stats: &[MethodStats]) {
    let baseline = stats[0].seconds;
    println!("\n{:<24} {:>10} {:>12} {:>12} {:>10}", "Method", "Records", "Time (s)", "Rate (r/s)", "Speedup");
    for s in stats {
        println!(
            "{:<24} {:>10} {:>12.3} {:>12.0} {:>9.2}x",
            s.name,
            s.records,
            s.seconds,
            s.records as f64 / s.seconds.max(1e-9),
            baseline / s.seconds.max(1e-9),
        );
    }
}
