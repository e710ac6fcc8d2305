#[path = "common/mod.rs"]
mod common;

use std::io::Cursor;

use common::{assert_snapshot, fastq};
use strscan::genomics::{parse_locus_table, render_report, ReportOptions};
use strscan::pipeline::{run_pipeline, FastqSequences, PipelineError, SourceChain};
use strscan::{build_index, ScanConfig};

const TABLE: &str = "# locus\ttype\tforward\treverse\tmotif\tperiod\toffset\n\
    L1\tAUTOSOMES\tAACCG\tTTGGC\tAT\t2\t0\n\
    D2\tAUTOSOMES\tGGGAA\tCCCTT\tGATA\t4\t1\n";

#[test]
fn fastq_to_report_matches_golden() {
    let loci = parse_locus_table(Cursor::new(TABLE), Some("AUTOSOMES")).expect("table parses");
    let config = ScanConfig::default()
        .with_anchor_distance(0)
        .with_workers(2)
        .with_batch_size(2)
        .with_diagnostics(true);
    let index = build_index(&loci, &config).expect("index builds");

    let first = fastq(&["AACCGATATTTTGGC", "AACCGATATTTTGGC", "GCCAAAATATCGGTT"]);
    let second = fastq(&["AACCGATATATTTGGC", "AACCGATATTTTGGC"]);
    let mut source = SourceChain::new(vec![
        FastqSequences::new(Cursor::new(first)),
        FastqSequences::new(Cursor::new(second)),
    ]);
    let output = run_pipeline(&index, &loci, &config, &mut source).expect("scan succeeds");
    assert_eq!(output.reads, 5);
    assert_eq!(output.calls, 5);

    let options = ReportOptions {
        min_count: 0,
        reverse_complement: true,
        verbose: true,
    };
    assert_snapshot("report/two_files.tsv", &render_report(&output.merged, &loci, &options));
}

#[test]
fn min_count_folds_rare_haplotypes() {
    let loci = parse_locus_table(Cursor::new(TABLE), None).expect("table parses");
    let config = ScanConfig::default().with_anchor_distance(0);
    let index = build_index(&loci, &config).expect("index builds");
    let reads = fastq(&["AACCGATATTTTGGC", "AACCGATATTTTGGC", "AACCGATATATTTGGC"]);
    let mut source = FastqSequences::new(Cursor::new(reads));
    let output = run_pipeline(&index, &loci, &config, &mut source).expect("scan succeeds");

    let options = ReportOptions {
        min_count: 2,
        reverse_complement: false,
        verbose: false,
    };
    assert_eq!(
        render_report(&output.merged, &loci, &options),
        "L1:2.1\t5 bases\tATATT\t\t2\nL1:0.0\t0 bases\tSumBelowThreshold\t\t1\n"
    );
}

#[test]
fn malformed_fastq_stops_the_scan() {
    let loci = parse_locus_table(Cursor::new(TABLE), None).expect("table parses");
    let config = ScanConfig::default().with_workers(3).with_batch_size(1);
    let index = build_index(&loci, &config).expect("index builds");
    let text = format!("{}AACCGATATTTTGGC\n+\nIIII\n", fastq(&["AACCGATATTTTGGC"]));
    let mut source = FastqSequences::new(Cursor::new(text));
    let err = run_pipeline(&index, &loci, &config, &mut source).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedFastq { record: 2, .. }), "{err}");
}
