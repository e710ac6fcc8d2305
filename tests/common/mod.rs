#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strscan::genomics::packed_dna::reverse_complement_text;
use strscan::genomics::Locus;

pub const L1_FORWARD: &str = "AACCG";
pub const L1_REVERSE: &str = "TTGGC";

/// AACCG / TTGGC bracketing an AT repeat.
pub fn l1() -> Locus {
    Locus::new("L1", L1_FORWARD, L1_REVERSE, "AT", 2, 0).expect("valid locus")
}

/// A second locus that shares no sequence with [`l1`].
pub fn d2() -> Locus {
    Locus::new("D2", "GGGAA", "CCCTT", "GATA", 4, 1).expect("valid locus")
}

/// A small table with distinct, non-overlapping anchors.
pub fn panel() -> Vec<Locus> {
    vec![
        l1(),
        d2(),
        Locus::with_counts("D3", "AUTOSOMES", ("TCAGTCAGTC", 1), ("GTGTACACTG", 1), "TTCA", 4, 0)
            .expect("valid locus"),
    ]
}

pub fn revcomp(read: &str) -> String {
    let rc = reverse_complement_text(read.as_bytes()).expect("ACGT read");
    String::from_utf8(rc).expect("ASCII")
}

/// Render reads as FASTQ with constant qualities.
pub fn fastq(reads: &[&str]) -> String {
    let mut out = String::new();
    for (idx, read) in reads.iter().enumerate() {
        out.push_str(&format!("@read{idx}\n{read}\n+\n{}\n", "I".repeat(read.len())));
    }
    out
}

fn base(rng: &mut StdRng) -> char {
    ['A', 'C', 'G', 'T'][rng.gen_range(0..4)]
}

fn bases(rng: &mut StdRng, len: usize) -> String {
    (0..len).map(|_| base(rng)).collect()
}

/// Reads drawn from `loci`: random flanks around `forward + motif^k + reverse`,
/// sometimes reverse complemented, sometimes with an anchor substitution,
/// and some pure noise.
pub fn synthetic_reads(loci: &[Locus], count: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let roll = rng.gen_range(0..10);
            if roll == 0 {
                return bases(&mut rng, 60);
            }
            let locus = &loci[rng.gen_range(0..loci.len())];
            let mut forward = String::from_utf8_lossy(locus.forward().sequence()).into_owned();
            if roll == 1 {
                let pos = rng.gen_range(0..forward.len());
                forward.replace_range(pos..pos + 1, &base(&mut rng).to_string());
            }
            let motif = String::from_utf8_lossy(locus.motif()).into_owned();
            let repeat = motif.repeat(rng.gen_range(2..8));
            let reverse = String::from_utf8_lossy(locus.reverse().sequence());
            let left_len = rng.gen_range(0..12);
            let left = bases(&mut rng, left_len);
            let right_len = rng.gen_range(0..12);
            let right = bases(&mut rng, right_len);
            let read = format!("{left}{forward}{repeat}{reverse}{right}");
            if rng.gen_bool(0.5) {
                revcomp(&read)
            } else {
                read
            }
        })
        .collect()
}

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("STRSCAN_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set STRSCAN_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}
