use std::borrow::{Borrow, Cow};
use std::collections::HashMap;
use std::fs::File;
use std::hash::Hash;
use std::io::{self, BufRead, BufReader};
use std::mem;
use std::path::Path;
use std::thread;

use crossbeam_channel::{bounded, Sender};
use tracing::{debug, info};

use crate::error::{FlowTagError, Result};
use crate::lookup::LookupTable;
use crate::models::{LookupKey, UNTAGGED};
use crate::parser::parse_line;

/// Counter that iterates keys in the order they were first seen.
#[derive(Debug, Clone)]
pub struct Tally<K> {
    index: HashMap<K, usize>,
    entries: Vec<(K, u64)>,
}

// Order-sensitive: two tallies are equal only if they saw keys in the same order.
impl<K: PartialEq> PartialEq for Tally<K> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Eq> Eq for Tally<K> {}

impl<K> Default for Tally<K> {
    fn default() -> Self {
        Tally {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> Tally<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += 1,
            None => self.push(key.to_owned(), 1),
        }
    }

    pub fn add(&mut self, key: K, count: u64) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 += count,
            None => self.push(key, count),
        }
    }

    fn push(&mut self, key: K, count: u64) {
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, count));
    }

    pub fn get<Q>(&self, key: &Q) -> u64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|&i| self.entries[i].1).unwrap_or(0)
    }

    /// Adds every count from `other`; keys new to `self` are appended in
    /// `other`'s order.
    pub fn merge(&mut self, other: Tally<K>) {
        for (key, count) in other.entries {
            self.add(key, count);
        }
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> + '_ {
        self.entries.iter().map(|(k, c)| (k, *c))
    }
}

/// Tag and port/protocol tallies for one pass over a flow log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowCounts {
    pub tags: Tally<String>,
    pub port_protocols: Tally<LookupKey>,
    pub lines_read: u64,
    pub skipped_lines: u64,
}

impl FlowCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies one line. Malformed lines only bump the line counters.
    pub fn record(&mut self, line: &str, table: &LookupTable) {
        self.lines_read += 1;
        let Some(record) = parse_line(line) else {
            self.skipped_lines += 1;
            debug!("Skipping malformed flow log line {}", self.lines_read);
            return;
        };

        let tag = table.get(record.dst_port, record.protocol).unwrap_or(UNTAGGED);
        self.tags.increment(tag);
        self.port_protocols.add(
            LookupKey {
                port: record.dst_port.to_string(),
                protocol: record.protocol.to_string(),
            },
            1,
        );
    }

    pub fn merge(&mut self, other: FlowCounts) {
        self.tags.merge(other.tags);
        self.port_protocols.merge(other.port_protocols);
        self.lines_read += other.lines_read;
        self.skipped_lines += other.skipped_lines;
    }

    /// Number of well-formed records counted.
    pub fn classified(&self) -> u64 {
        self.lines_read - self.skipped_lines
    }
}

pub fn classify<I, S>(lines: I, table: &LookupTable) -> FlowCounts
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts = FlowCounts::new();
    for line in lines {
        counts.record(line.as_ref(), table);
    }
    counts
}

/// Splits a byte stream into lines ending at `\n`, `\r\n` or a bare `\r`.
struct FlowLines<R> {
    reader: R,
    // Set after a `\r` so a following `\n` is not read as an empty line.
    pending_lf: bool,
}

impl<R: BufRead> FlowLines<R> {
    fn new(reader: R) -> Self {
        FlowLines {
            reader,
            pending_lf: false,
        }
    }

    /// Fills `buf` with the next line, terminator stripped. Returns `false`
    /// at end of input.
    fn next_line(&mut self, buf: &mut Vec<u8>) -> io::Result<bool> {
        buf.clear();
        let mut read_any = false;
        loop {
            let (consumed, done) = {
                let available = self.reader.fill_buf()?;
                if available.is_empty() {
                    return Ok(read_any);
                }
                let mut start = 0;
                if self.pending_lf {
                    self.pending_lf = false;
                    if available[0] == b'\n' {
                        start = 1;
                    }
                }
                let rest = &available[start..];
                match rest.iter().position(|&b| b == b'\n' || b == b'\r') {
                    Some(i) => {
                        buf.extend_from_slice(&rest[..i]);
                        self.pending_lf = rest[i] == b'\r';
                        (start + i + 1, true)
                    }
                    None => {
                        buf.extend_from_slice(rest);
                        read_any |= !rest.is_empty();
                        (available.len(), false)
                    }
                }
            };
            self.reader.consume(consumed);
            if done {
                return Ok(true);
            }
        }
    }
}

/// Streams lines from `reader`. Invalid UTF-8 is replaced rather than
/// rejected; only I/O failures abort.
pub fn classify_reader<R: BufRead>(reader: R, table: &LookupTable) -> Result<FlowCounts> {
    let mut counts = FlowCounts::new();
    let mut lines = FlowLines::new(reader);
    let mut buf = Vec::new();
    while lines.next_line(&mut buf).map_err(FlowTagError::Read)? {
        counts.record(&decode_line(&buf), table);
    }
    Ok(counts)
}

fn decode_line(buf: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(buf)
}

fn merge_in_order(mut partials: Vec<(usize, FlowCounts)>) -> FlowCounts {
    partials.sort_by_key(|(idx, _)| *idx);
    let mut counts = FlowCounts::new();
    for (_, partial) in partials {
        counts.merge(partial);
    }
    counts
}

/// Splits `lines` into `workers` contiguous shards and classifies them in
/// parallel. Partials are merged in shard order, so the result is identical
/// to [`classify`] over the same lines.
pub fn classify_sharded<S>(lines: &[S], table: &LookupTable, workers: usize) -> Result<FlowCounts>
where
    S: AsRef<str> + Sync,
{
    if workers <= 1 || lines.len() < 2 {
        return Ok(classify(lines, table));
    }

    let shard_len = lines.len().div_ceil(workers);
    let partials = thread::scope(|scope| {
        let handles: Vec<_> = lines
            .chunks(shard_len)
            .map(|chunk| scope.spawn(move || classify(chunk, table)))
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| FlowTagError::WorkerPanicked))
            .collect::<Result<Vec<_>>>()
    })?;

    let mut counts = FlowCounts::new();
    for partial in partials {
        counts.merge(partial);
    }
    Ok(counts)
}

/// Lines per batch handed to a worker by [`classify_reader_parallel`].
pub const BATCH_LINES: usize = 8192;

/// Streams `reader` to `workers` threads in numbered batches over a bounded
/// channel. Per-batch partials are merged in batch order, so the result is
/// identical to [`classify_reader`].
pub fn classify_reader_parallel<R: BufRead>(
    reader: R,
    table: &LookupTable,
    workers: usize,
) -> Result<FlowCounts> {
    classify_batches(reader, table, workers, BATCH_LINES)
}

fn classify_batches<R: BufRead>(
    reader: R,
    table: &LookupTable,
    workers: usize,
    batch_lines: usize,
) -> Result<FlowCounts> {
    if workers <= 1 {
        return classify_reader(reader, table);
    }

    let (tx, rx) = bounded::<(usize, Vec<String>)>(workers * 2);

    thread::scope(|scope| -> Result<FlowCounts> {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let rx = rx.clone();
                scope.spawn(move || {
                    let mut partials = Vec::new();
                    for (batch, lines) in rx.iter() {
                        partials.push((batch, classify(&lines, table)));
                    }
                    debug!("Worker {} classified {} batches", worker, partials.len());
                    partials
                })
            })
            .collect();
        drop(rx);

        let fed = feed_batches(reader, &tx, batch_lines);
        drop(tx);

        let mut partials = Vec::new();
        for handle in handles {
            partials.extend(handle.join().map_err(|_| FlowTagError::WorkerPanicked)?);
        }
        fed?;
        Ok(merge_in_order(partials))
    })
}

fn feed_batches<R: BufRead>(
    reader: R,
    tx: &Sender<(usize, Vec<String>)>,
    batch_lines: usize,
) -> Result<()> {
    let mut lines = FlowLines::new(reader);
    let mut buf = Vec::new();
    let mut batch = Vec::with_capacity(batch_lines);
    let mut idx = 0;

    while lines.next_line(&mut buf).map_err(FlowTagError::Read)? {
        batch.push(decode_line(&buf).into_owned());
        if batch.len() == batch_lines {
            // Every worker gone means they panicked; join reports it.
            if tx.send((idx, mem::take(&mut batch))).is_err() {
                return Ok(());
            }
            idx += 1;
        }
    }
    if !batch.is_empty() {
        let _ = tx.send((idx, batch));
    }
    Ok(())
}

/// Classifies the flow log at `path`, streaming it to `workers` threads when
/// more than one is requested.
pub fn classify_file(path: impl AsRef<Path>, table: &LookupTable, workers: usize) -> Result<FlowCounts> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FlowTagError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let counts = classify_reader_parallel(BufReader::new(file), table, workers)?;

    info!(
        "Classified {} of {} lines from {} ({} malformed)",
        counts.classified(),
        counts.lines_read,
        path.display(),
        counts.skipped_lines
    );
    Ok(counts)
}
