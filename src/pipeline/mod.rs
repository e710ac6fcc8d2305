//! Batched read classification, sequential or across a pool of workers.
//!
//! With more than one worker a producer thread fills two alternating batches
//! while the workers classify the other one. Every worker takes the reads
//! whose batch index is congruent to its id modulo the worker count, and
//! keeps its own [`Tally`]; tallies are merged in worker order at the end.

mod double_buffer;
mod source;

use thiserror::Error;
use tracing::{debug, trace};

use crate::config::{ConfigError, ScanConfig};
use crate::genomics::{Classifier, IndexError, Locus, ScanError, Tally, TrieIndex};
use double_buffer::{slot_for, AbortOnPanic, DoubleBuffer};

pub use source::{Batch, FastqSequences, RecordSource, SourceChain, VecSource};

/// Failures that stop a scan.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected scan parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The locus index could not be built.
    #[error("index construction failed: {0}")]
    Index(#[from] IndexError),

    /// A read contained a byte the classifier does not accept.
    #[error("read {read}: {source}")]
    Scan {
        /// 0-based position of the read in the input stream.
        read: u64,
        /// Underlying classifier error.
        source: ScanError,
    },

    /// Reading input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The FASTQ parser rejected a record.
    #[error("malformed FASTQ record {record}: {reason}")]
    MalformedFastq {
        /// 1-based record number.
        record: u64,
        /// Parser message.
        reason: String,
    },

    /// Another task failed first and the scan was abandoned.
    #[error("scan aborted after another task failed")]
    Aborted,

    /// A task panicked.
    #[error("a scan task panicked")]
    Panicked,
}

/// Everything a scan produced.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    /// One tally per worker, in worker order.
    pub tallies: Vec<Tally>,
    /// All worker tallies merged in worker order.
    pub merged: Tally,
    /// Reads pulled from the source.
    pub reads: u64,
    /// Haplotype calls made by the classifiers.
    pub calls: u64,
}

/// Classify every read of `source` against `loci`.
pub fn run_pipeline<S: RecordSource>(
    index: &TrieIndex,
    loci: &[Locus],
    config: &ScanConfig,
    source: &mut S,
) -> Result<ScanOutput, PipelineError> {
    config.validate()?;
    index.check_table(loci)?;
    debug!(
        workers = config.workers,
        batch_size = config.batch_size,
        loci = loci.len(),
        "starting scan"
    );

    let (tallies, reads, calls) = if config.workers == 1 {
        run_sequential(index, loci, config, source)?
    } else {
        run_threaded(index, loci, config, source)?
    };

    let mut merged = Tally::new(loci.len());
    for tally in &tallies {
        merged.merge(tally);
    }
    debug!(reads, calls, haplotypes = merged.len(), "scan finished");
    Ok(ScanOutput {
        tallies,
        merged,
        reads,
        calls,
    })
}

type WorkerResult = (Vec<Tally>, u64, u64);

/// Classify this worker's stripe of `batch`; returns the number of calls.
fn classify_stripe(
    classifier: &mut Classifier<'_>,
    batch: &Batch,
    worker: usize,
    stride: usize,
    tally: &mut Tally,
) -> Result<u64, PipelineError> {
    let mut calls = 0u64;
    for (idx, read) in batch.iter().enumerate().skip(worker).step_by(stride) {
        calls += classifier
            .classify(read, tally)
            .map_err(|source| PipelineError::Scan {
                read: batch.first_ordinal() + idx as u64,
                source,
            })? as u64;
    }
    Ok(calls)
}

fn run_sequential<S: RecordSource>(
    index: &TrieIndex,
    loci: &[Locus],
    config: &ScanConfig,
    source: &mut S,
) -> Result<WorkerResult, PipelineError> {
    let mut classifier = Classifier::new(index, loci, config)?;
    let mut tally = Tally::new(loci.len());
    let mut batch = Batch::with_capacity(config.batch_size);
    let (mut reads, mut calls) = (0u64, 0u64);

    loop {
        batch.reset(reads);
        let exhausted = source.fill(&mut batch)?;
        reads += batch.len() as u64;
        trace!(reads = batch.len(), "classifying batch");
        calls += classify_stripe(&mut classifier, &batch, 0, 1, &mut tally)?;
        if exhausted {
            break;
        }
    }
    Ok((vec![tally], reads, calls))
}

fn run_threaded<S: RecordSource>(
    index: &TrieIndex,
    loci: &[Locus],
    config: &ScanConfig,
    source: &mut S,
) -> Result<WorkerResult, PipelineError> {
    let workers = config.workers;
    let buffer = DoubleBuffer::new(config.batch_size, workers);

    std::thread::scope(|scope| {
        let buffer = &buffer;
        let producer = scope.spawn(move || {
            let _guard = AbortOnPanic(buffer);
            produce(buffer, source).map_err(|err| {
                buffer.abort();
                err
            })
        });
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                scope.spawn(move || {
                    let _guard = AbortOnPanic(buffer);
                    work(buffer, index, loci, config, worker, workers).map_err(|err| {
                        buffer.abort();
                        err
                    })
                })
            })
            .collect();

        let produced = producer.join().unwrap_or(Err(PipelineError::Panicked));
        let finished: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(Err(PipelineError::Panicked)))
            .collect();

        let mut errors = Vec::new();
        let mut tallies = Vec::with_capacity(workers);
        let mut calls = 0u64;
        for result in finished {
            match result {
                Ok((tally, n)) => {
                    tallies.push(tally);
                    calls += n;
                }
                Err(err) => errors.push(err),
            }
        }
        let reads = produced.unwrap_or_else(|err| {
            errors.push(err);
            0
        });
        if errors.is_empty() {
            return Ok((tallies, reads, calls));
        }
        // Secondary aborts only echo the failure that caused them.
        let cause = errors
            .iter()
            .position(|err| !matches!(err, PipelineError::Aborted))
            .map_or(PipelineError::Aborted, |idx| errors.swap_remove(idx));
        Err(cause)
    })
}

/// Fill slots pass by pass; returns the number of reads produced.
fn produce<S: RecordSource>(buffer: &DoubleBuffer, source: &mut S) -> Result<u64, PipelineError> {
    let mut reads = 0u64;
    for pass in 0u64.. {
        let exhausted = {
            let mut batch = buffer.acquire_for_fill(slot_for(pass))?;
            batch.reset(reads);
            let exhausted = source.fill(&mut batch)?;
            reads += batch.len() as u64;
            trace!(pass, reads = batch.len(), exhausted, "published batch");
            exhausted
        };
        buffer.publish(pass, exhausted)?;
        if exhausted {
            break;
        }
    }
    Ok(reads)
}

/// Classify one stripe of every pass; returns the worker tally and call count.
fn work(
    buffer: &DoubleBuffer,
    index: &TrieIndex,
    loci: &[Locus],
    config: &ScanConfig,
    worker: usize,
    workers: usize,
) -> Result<(Tally, u64), PipelineError> {
    let mut classifier = Classifier::new(index, loci, config)?;
    let mut tally = Tally::new(loci.len());
    let mut calls = 0u64;
    for pass in 0u64.. {
        let last = {
            let (batch, last) = buffer.acquire_for_pass(pass)?;
            calls += classify_stripe(&mut classifier, &batch, worker, workers, &mut tally)?;
            last
        };
        buffer.check_in(pass)?;
        if last {
            break;
        }
    }
    trace!(worker, calls, "worker done");
    Ok((tally, calls))
}
