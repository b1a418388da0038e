// Shared traffic fixtures for integration tests
//
// Records are generated from a seeded RNG so every test sees the same data.

#![allow(dead_code)]

use netsentry::schema::Record;
use netsentry::table::RawTable;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};

const PROTOCOLS: [&str; 3] = ["tcp", "udp", "icmp"];
const SERVICES: [&str; 4] = ["http", "dns", "ftp", "smtp"];
const FLAGS: [&str; 3] = ["SF", "S0", "REJ"];

/// Ordinary traffic record
pub fn normal_record(rng: &mut StdRng) -> Record {
    Record {
        duration: rng.gen_range(0.0..2.0),
        src_bytes: rng.gen_range(200.0..1_500.0),
        dst_bytes: rng.gen_range(100.0..5_000.0),
        count: rng.gen_range(1..20) as f64,
        srv_count: rng.gen_range(1..10) as f64,
        protocol: PROTOCOLS.choose(rng).unwrap().to_string(),
        service: SERVICES.choose(rng).unwrap().to_string(),
        flag: FLAGS.choose(rng).unwrap().to_string(),
        label: Some(false),
    }
}

/// Record with extreme `duration` and `src_bytes`
pub fn extreme_record(rng: &mut StdRng) -> Record {
    Record {
        duration: rng.gen_range(5_000.0..10_000.0),
        src_bytes: rng.gen_range(1_000_000.0..5_000_000.0),
        label: Some(true),
        ..normal_record(rng)
    }
}

/// `total` records, the first `anomalies` of them extreme, then shuffled
pub fn traffic_records(total: usize, anomalies: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records: Vec<Record> = (0..total)
        .map(|i| {
            if i < anomalies {
                extreme_record(&mut rng)
            } else {
                normal_record(&mut rng)
            }
        })
        .collect();
    records.shuffle(&mut rng);
    records
}

/// Same records with the label removed
pub fn unlabeled(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .cloned()
        .map(|r| Record { label: None, ..r })
        .collect()
}

pub fn traffic_table(total: usize, anomalies: usize, seed: u64) -> RawTable {
    RawTable::from_records(&traffic_records(total, anomalies, seed))
}

/// Write records as CSV with a header row
pub fn write_csv(dir: &Path, name: &str, records: &[Record]) -> PathBuf {
    let mut text = String::from("duration,src_bytes,dst_bytes,count,srv_count,protocol,service,flag");
    let labeled = records.iter().any(|r| r.label.is_some());
    if labeled {
        text.push_str(",label");
    }
    text.push('\n');

    for r in records {
        text.push_str(&format!(
            "{},{},{},{},{},{},{},{}",
            r.duration, r.src_bytes, r.dst_bytes, r.count, r.srv_count, r.protocol, r.service, r.flag
        ));
        if labeled {
            text.push_str(if r.label == Some(true) { ",1" } else { ",0" });
        }
        text.push('\n');
    }

    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}
