//! Read batches and the sources that fill them.

use std::collections::VecDeque;
use std::fmt;
use std::io::Read;

use seq_io::fastq::{self, Record};

use super::PipelineError;

/// Fixed-capacity set of reads; record buffers are reused across passes.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    records: Vec<Vec<u8>>,
    len: usize,
    capacity: usize,
    first_ordinal: u64,
}

impl Batch {
    /// Empty batch holding at most `capacity` reads.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            len: 0,
            capacity,
            first_ordinal: 0,
        }
    }

    /// Maximum number of reads.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reads currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when no reads are held.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `true` when no further read fits.
    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    /// Stream position of the first read in this batch.
    pub fn first_ordinal(&self) -> u64 {
        self.first_ordinal
    }

    /// Append a copy of `sequence`. Returns `false` when the batch is full.
    pub fn push(&mut self, sequence: &[u8]) -> bool {
        if self.is_full() {
            return false;
        }
        if self.len == self.records.len() {
            self.records.push(Vec::new());
        }
        let slot = &mut self.records[self.len];
        slot.clear();
        slot.extend_from_slice(sequence);
        self.len += 1;
        true
    }

    /// Read at `idx`.
    pub fn get(&self, idx: usize) -> Option<&[u8]> {
        self.records[..self.len].get(idx).map(Vec::as_slice)
    }

    /// Reads in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.records[..self.len].iter().map(Vec::as_slice)
    }

    pub(crate) fn reset(&mut self, first_ordinal: u64) {
        self.len = 0;
        self.first_ordinal = first_ordinal;
    }
}

/// Producer of read sequences for the pipeline.
pub trait RecordSource: Send {
    /// Append reads to `batch` until it is full or the source runs dry.
    ///
    /// Returns `true` once the source has nothing left after this batch.
    fn fill(&mut self, batch: &mut Batch) -> Result<bool, PipelineError>;
}

/// In-memory reads, mostly for tests and benchmarks.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    reads: Vec<Vec<u8>>,
    next: usize,
}

impl VecSource {
    /// Source yielding `reads` in order.
    pub fn new<I, S>(reads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            reads: reads.into_iter().map(|r| r.as_ref().to_vec()).collect(),
            next: 0,
        }
    }
}

impl RecordSource for VecSource {
    fn fill(&mut self, batch: &mut Batch) -> Result<bool, PipelineError> {
        while self.next < self.reads.len() && batch.push(&self.reads[self.next]) {
            self.next += 1;
        }
        Ok(self.next == self.reads.len())
    }
}

/// Sequence lines of a FASTQ stream.
///
/// Parsing is done by [`seq_io::fastq::Reader`]; only the sequence of each
/// record is kept, with trailing whitespace removed. One record is read
/// ahead so that a batch ending exactly at the end of the stream is
/// reported as the last one.
pub struct FastqSequences<R: Read> {
    reader: fastq::Reader<R>,
    sequence: Vec<u8>,
    held: bool,
    records: u64,
}

impl<R: Read> FastqSequences<R> {
    /// Wrap a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader: fastq::Reader::new(reader),
            sequence: Vec::new(),
            held: false,
            records: 0,
        }
    }

    /// Records read so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Load the next sequence into `self.sequence`; `false` at end of stream.
    fn next_record(&mut self) -> Result<bool, PipelineError> {
        let ordinal = self.records + 1;
        let record = match self.reader.next() {
            None => return Ok(false),
            Some(Ok(record)) => record,
            Some(Err(err)) => return Err(fastq_error(ordinal, err)),
        };
        let seq = record.seq();
        let end = seq
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map_or(0, |last| last + 1);
        self.sequence.clear();
        self.sequence.extend_from_slice(&seq[..end]);
        self.records = ordinal;
        self.held = true;
        Ok(true)
    }
}

impl<R: Read> fmt::Debug for FastqSequences<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastqSequences")
            .field("records", &self.records)
            .field("held", &self.held)
            .finish_non_exhaustive()
    }
}

fn fastq_error(record: u64, err: fastq::Error) -> PipelineError {
    match err {
        fastq::Error::Io(err) => PipelineError::Io(err),
        other => PipelineError::MalformedFastq {
            record,
            reason: other.to_string(),
        },
    }
}

impl<R: Read + Send> RecordSource for FastqSequences<R> {
    fn fill(&mut self, batch: &mut Batch) -> Result<bool, PipelineError> {
        loop {
            if self.held {
                if !batch.push(&self.sequence) {
                    return Ok(false);
                }
                self.held = false;
            }
            if !self.next_record()? {
                return Ok(true);
            }
        }
    }
}

/// Several sources read back to back as one stream.
#[derive(Debug)]
pub struct SourceChain<S> {
    sources: VecDeque<S>,
}

impl<S: RecordSource> SourceChain<S> {
    /// Chain `sources` in order.
    pub fn new(sources: impl IntoIterator<Item = S>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
        }
    }
}

impl<S: RecordSource> RecordSource for SourceChain<S> {
    fn fill(&mut self, batch: &mut Batch) -> Result<bool, PipelineError> {
        while let Some(current) = self.sources.front_mut() {
            if !current.fill(batch)? {
                return Ok(false);
            }
            self.sources.pop_front();
            if batch.is_full() {
                break;
            }
        }
        Ok(self.sources.is_empty())
    }
}
