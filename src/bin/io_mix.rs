//! I/O-mix driver: replay read/write mixes against record files under LRU
//! and MRU replacement and report the buffer counters.
//!
//! Usage:
//!   io_mix [--ops N] [--bufs N] [--csv] [--json] [dataset.txt ...]
//!
//! Each dataset is a text file with a header line and one `|`-delimited
//! record per line; with no datasets a synthetic one is generated. With
//! `--csv`, per-run statistics are appended to `io_mix_lru.csv` and
//! `io_mix_mru.csv`; with `--json` the run summaries are dumped to stdout.

use paged_storage::{
    BufferStats, PageId, PagedFileManager, RecordFile, ReplacementStrategy, Result, StudentRecord,
    DEFAULT_BUF_CAPACITY,
};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::exit;

const READ_MIXES: [u32; 4] = [100, 90, 70, 50];
const DEFAULT_OPS: usize = 10_000;

#[derive(Serialize)]
struct RunSummary {
    dataset: String,
    strategy: String,
    read_pct: u32,
    write_pct: u32,
    num_pages: i32,
    #[serde(flatten)]
    stats: BufferStats,
    hit_ratio: f64,
}

/// Small xorshift generator so runs are repeatable without seeding.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

fn main() {
    env_logger::init();

    let mut ops = DEFAULT_OPS;
    let mut bufs = DEFAULT_BUF_CAPACITY;
    let mut emit_csv = false;
    let mut emit_json = false;
    let mut datasets: Vec<String> = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--ops" => ops = parse_count(args.next(), "--ops"),
            "--bufs" => bufs = parse_count(args.next(), "--bufs"),
            "--csv" => emit_csv = true,
            "--json" => emit_json = true,
            "--help" | "-h" => {
                eprintln!("Usage: io_mix [--ops N] [--bufs N] [--csv] [--json] [dataset.txt ...]");
                exit(0);
            }
            other => datasets.push(other.to_string()),
        }
    }

    if let Err(e) = run(ops, bufs, emit_csv, emit_json, &datasets) {
        eprintln!("ERROR: {e}");
        exit(1);
    }
}

fn parse_count(value: Option<String>, flag: &str) -> usize {
    match value.and_then(|v| v.parse().ok()) {
        Some(n) if n > 0 => n,
        _ => {
            eprintln!("ERROR: {flag} expects a positive integer");
            exit(1);
        }
    }
}

fn run(ops: usize, bufs: usize, emit_csv: bool, emit_json: bool, datasets: &[String]) -> Result<()> {
    let mut mgr = PagedFileManager::new(bufs);
    let mut summaries: Vec<RunSummary> = Vec::new();

    let named: Vec<(String, Vec<Vec<u8>>)> = if datasets.is_empty() {
        println!("No datasets given, generating a synthetic one");
        vec![("synthetic".to_string(), synthetic_records(2000))]
    } else {
        let mut loaded = Vec::new();
        for path in datasets {
            match load_dataset(path) {
                Ok(records) => loaded.push((dataset_name(path), records)),
                Err(e) => eprintln!("Warning: skipping {path}: {e}"),
            }
        }
        loaded
    };

    for (name, records) in &named {
        let db_path = format!("{name}.rf");
        let _ = fs::remove_file(&db_path);
        RecordFile::create(&mut mgr, &db_path)?;
        let mut file = RecordFile::open(&mut mgr, &db_path)?;
        for record in records {
            file.insert_bytes(&mut mgr, record)?;
        }
        let num_pages = file.num_pages(&mgr)?;
        println!("Loaded {} records of {name} into {num_pages} pages", records.len());

        for strategy in [ReplacementStrategy::Lru, ReplacementStrategy::Mru] {
            mgr.set_strategy(strategy);
            for read_pct in READ_MIXES {
                mgr.reset_stats();
                simulate(&mut mgr, &file, num_pages, ops, read_pct)?;
                let stats = mgr.stats();

                println!(
                    "{name} {strategy} {read_pct}r/{write_pct}w: hits {}, misses {}, ratio {:.2}%",
                    stats.buffer_hits,
                    stats.buffer_misses,
                    stats.hit_ratio() * 100.0,
                    write_pct = 100 - read_pct,
                );
                summaries.push(RunSummary {
                    dataset: name.clone(),
                    strategy: strategy.to_string(),
                    read_pct,
                    write_pct: 100 - read_pct,
                    num_pages,
                    stats,
                    hit_ratio: stats.hit_ratio(),
                });
            }
            mgr.print_stats();
        }

        file.close(&mut mgr)?;
    }

    if emit_csv {
        write_csv(&summaries)?;
    }
    if emit_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summaries)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
        );
    }
    Ok(())
}

/// Random page touches at the given read percentage; writes dirty the page.
fn simulate(
    mgr: &mut PagedFileManager,
    file: &RecordFile,
    num_pages: i32,
    ops: usize,
    read_pct: u32,
) -> Result<()> {
    if num_pages == 0 {
        return Ok(());
    }
    let mut rng = Rng(0x9E3779B97F4A7C15);
    for _ in 0..ops {
        let page = PageId::new((rng.next() % num_pages as u64) as i32);
        let mut guard = mgr.get_this_page(file.fd(), page)?;
        if rng.next() % 100 >= read_pct as u64 {
            guard.mark_dirty();
        }
        guard.unfix()?;
    }
    Ok(())
}

fn load_dataset(path: &str) -> std::result::Result<Vec<Vec<u8>>, String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let records: Vec<Vec<u8>> = text
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.as_bytes().to_vec())
        .collect();
    if records.is_empty() {
        return Err("no records".to_string());
    }
    Ok(records)
}

fn dataset_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn synthetic_records(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| {
            StudentRecord {
                roll_no: format!("CS24B{i:05}"),
                name: format!("Student {i}"),
                batch: "2024".into(),
                degree: "BTech".into(),
                dept: "CSE".into(),
                join_yr: 2024,
                categ: "GEN".into(),
                sex: if i % 2 == 0 { "F" } else { "M" }.into(),
                father_name: format!("Parent {i}"),
                birthdate: "2006-06-15".into(),
                address: format!("{i} Institute Road"),
                city: "Chennai".into(),
                state: "TN".into(),
                pincode: "600036".into(),
            }
            .to_bytes()
        })
        .collect()
}

fn write_csv(summaries: &[RunSummary]) -> Result<()> {
    for strategy in ["LRU", "MRU"] {
        let path = format!("io_mix_{}.csv", strategy.to_lowercase());
        let mut out = fs::File::create(&path)?;
        writeln!(
            out,
            "Dataset,ReadPct,WritePct,NumPages,LogicalReads,LogicalWrites,PhysicalReads,PhysicalWrites,BufferHits,BufferMisses,HitRatio"
        )?;
        for s in summaries.iter().filter(|s| s.strategy == strategy) {
            writeln!(
                out,
                "{},{},{},{},{},{},{},{},{},{},{:.4}",
                s.dataset,
                s.read_pct,
                s.write_pct,
                s.num_pages,
                s.stats.logical_reads,
                s.stats.logical_writes,
                s.stats.physical_reads,
                s.stats.physical_writes,
                s.stats.buffer_hits,
                s.stats.buffer_misses,
                s.hit_ratio,
            )?;
        }
        println!("Wrote {path}");
    }
    Ok(())
}
