//! Tab-separated locus table reader.
//!
//! Columns: name, marker type, forward anchor, reverse anchor, motif,
//! period, offset. An anchor may carry a `,N` suffix giving the number of
//! copies a read must contain. Lines starting with `#` are comments.

use std::io::BufRead;

use tracing::{debug, warn};

use crate::genomics::locus::{Locus, LocusError};

const COMMENT: char = '#';
const SEP: char = '\t';

/// `true` when either string is a prefix of the other.
fn type_matches(filter: &str, marker_type: &str) -> bool {
    filter.starts_with(marker_type) || marker_type.starts_with(filter)
}

/// Split an optional `,N` copy-count suffix off an anchor column.
fn split_count(field: &str) -> (&str, u8) {
    match field.rsplit_once(',') {
        // Unparsable counts become 0 and are rejected by validation.
        Some((sequence, count)) => (sequence, count.trim().parse().unwrap_or(0)),
        None => (field, 1),
    }
}

fn parse_line(line_no: usize, line: &str) -> Result<Locus, LocusError> {
    let mut fields = line.split(SEP);
    let mut next = |field: &'static str| {
        fields
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(LocusError::MissingField { line: line_no, field })
    };
    let name = next("name")?;
    let marker_type = next("type")?;
    let forward = next("forward anchor")?;
    let reverse = next("reverse anchor")?;
    let motif = next("motif")?;
    let period = next("period")?;
    let offset = next("offset")?;

    let at_line = |err: LocusError| LocusError::AtLine {
        line: line_no,
        source: Box::new(err),
    };
    let spacing = || {
        at_line(LocusError::InvalidSpacing {
            locus: name.to_string(),
            period: period.to_string(),
            offset: offset.to_string(),
        })
    };
    let period_value: u16 = period.parse().map_err(|_| spacing())?;
    let offset_value: u16 = offset.parse().map_err(|_| spacing())?;

    Locus::with_counts(
        name,
        marker_type,
        split_count(forward),
        split_count(reverse),
        motif,
        period_value,
        offset_value,
    )
    .map_err(at_line)
}

/// Read every locus in `reader`, keeping only those whose marker type
/// matches `type_filter` by prefix when one is given.
pub fn parse_locus_table<R: BufRead>(reader: R, type_filter: Option<&str>) -> Result<Vec<Locus>, LocusError> {
    let mut loci = Vec::new();
    let mut skipped = 0usize;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| LocusError::Io(err.to_string()))?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with(COMMENT) {
            continue;
        }
        let locus = parse_line(idx + 1, line)?;
        match type_filter {
            Some(filter) if !type_matches(filter, locus.marker_type()) => skipped += 1,
            _ => loci.push(locus),
        }
    }

    debug!(loci = loci.len(), filtered = skipped, "parsed locus table");
    if loci.is_empty() {
        warn!(?type_filter, "no loci found in locus table");
    }
    Ok(loci)
}
