//! Tab-separated haplotype report.

use std::io::{self, Write};

use crate::genomics::haplotype::{HaplotypeKey, StrandCounts, Tally};
use crate::genomics::locus::Locus;

/// Header of the per-locus diagnostics table.
///
/// The second column counts reads in which one anchor of a strand met its
/// count while the other, left or right, fell short.
pub const BIAS_HEADER: &str =
    "MarkerName\tMissingOppositeAnchor_Counts\tTotalMatches_Count\tRatio\tAvgLeftPos\tAvgRightPos";

/// Controls how a [`Tally`] is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Haplotypes seen fewer times are folded into one summary row per locus.
    pub min_count: u32,
    /// Print positive and negative counts separately; otherwise only totals.
    pub reverse_complement: bool,
    /// Append the per-locus diagnostics table.
    pub verbose: bool,
}

fn write_counts<W: Write>(out: &mut W, counts: StrandCounts, split: bool) -> io::Result<()> {
    if split {
        writeln!(out, "\t{}\t{}", counts.positive, counts.negative)
    } else {
        writeln!(out, "\t\t{}", counts.total())
    }
}

fn write_below_threshold<W: Write>(
    out: &mut W,
    locus: &str,
    skipped: StrandCounts,
    split: bool,
) -> io::Result<()> {
    if skipped.total() == 0 {
        return Ok(());
    }
    write!(out, "{locus}:0.0\t0 bases\tSumBelowThreshold")?;
    write_counts(out, skipped, split)
}

/// Write one row per haplotype, grouped by locus and ordered by descending
/// total count, followed by the optional diagnostics table.
pub fn write_report<W: Write>(
    out: &mut W,
    tally: &Tally,
    loci: &[Locus],
    options: &ReportOptions,
) -> io::Result<()> {
    let mut rows: Vec<(&HaplotypeKey, &StrandCounts)> = tally.iter().collect();
    // Stable: ties keep key order.
    rows.sort_by(|(a, ca), (b, cb)| {
        a.locus_id
            .cmp(&b.locus_id)
            .then_with(|| cb.total().cmp(&ca.total()))
    });

    let split = options.reverse_complement;
    let mut current: Option<u32> = None;
    let mut skipped = StrandCounts::default();
    for (key, counts) in rows {
        let Some(locus) = loci.get(key.locus_id as usize) else {
            continue;
        };
        if current != Some(key.locus_id) {
            if let Some(prev) = current.and_then(|id| loci.get(id as usize)) {
                write_below_threshold(out, prev.name(), skipped, split)?;
            }
            current = Some(key.locus_id);
            skipped = StrandCounts::default();
        }
        if counts.total() < options.min_count {
            skipped.positive += counts.positive;
            skipped.negative += counts.negative;
            continue;
        }
        let len = key.len as usize;
        write!(
            out,
            "{}:{}\t{} bases\t{}",
            locus.name(),
            locus.allele_name(len),
            len,
            key.sequence()
        )?;
        write_counts(out, *counts, split)?;
    }
    if let Some(prev) = current.and_then(|id| loci.get(id as usize)) {
        write_below_threshold(out, prev.name(), skipped, split)?;
    }

    if options.verbose {
        write!(out, "\n\nBias Reporting\n{BIAS_HEADER}\n")?;
        for (locus, stats) in loci.iter().zip(tally.stats()) {
            let (missing, calls) = (stats.missing_anchor, stats.calls);
            write!(out, "{}\t{missing}\t{calls}\t", locus.name())?;
            let seen = u64::from(missing) + u64::from(calls);
            if seen > 0 {
                write!(out, "{:.4}\t", f64::from(missing) / seen as f64)?;
            } else {
                write!(out, "NaN\t")?;
            }
            if calls > 0 {
                writeln!(
                    out,
                    "{:.1}\t{:.1}",
                    stats.left_pos_sum as f64 / f64::from(calls),
                    stats.right_pos_sum as f64 / f64::from(calls)
                )?;
            } else {
                writeln!(out, "NaN\tNaN")?;
            }
        }
    }
    Ok(())
}

/// [`write_report`] into a `String`.
pub fn render_report(tally: &Tally, loci: &[Locus], options: &ReportOptions) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_report(&mut buf, tally, loci, options);
    String::from_utf8_lossy(&buf).into_owned()
}
