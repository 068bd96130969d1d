//! Prepares beat buckets ahead of playback on a background thread.
//!
//! A [`BeatRing`] owns a fixed number of slots. Its worker fills the slot of
//! the next beat it has not produced yet, as long as that slot is free; the
//! consumer takes the slot of the next beat it has not consumed yet. The ring
//! size bounds how far the worker can run ahead. When the consumer finds its
//! slot empty it logs the stall, asks the worker to refill and waits for that
//! slot only, since playback must not skip a beat.

use std::{
    collections::BTreeMap,
    ops::Range,
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::{
    error::{ChartError, Result},
    model::Chart,
};

/// Size of the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RingConfig {
    /// Number of beats prepared ahead, at least 1.
    pub capacity: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self { capacity: 8 }
    }
}

impl RingConfig {
    /// Sets [`RingConfig::capacity`].
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Everything that becomes active during one beat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeatChunk {
    /// The beat index.
    pub beat: i64,
    /// Indices of the notes starting in this beat.
    pub notes: Vec<usize>,
    /// Indices of the unit events starting in this beat.
    pub events: Vec<usize>,
}

/// Produces the chunk of each beat.
pub trait ChunkSource: Send + Sync {
    /// Builds the chunk of `beat`.
    ///
    /// # Errors
    ///
    /// Any error is reported to the consumer, which stops at that beat.
    fn chunk(&self, beat: i64) -> Result<BeatChunk>;

    /// Beats to deliver, in order.
    fn beat_range(&self) -> Range<i64>;
}

/// Serves the beat buckets of a prepared chart.
#[derive(Debug, Clone, Default)]
pub struct BucketSource {
    note_buckets: BTreeMap<i64, Vec<usize>>,
    event_buckets: BTreeMap<i64, Vec<usize>>,
}

impl BucketSource {
    /// Copies the buckets of `chart`.
    #[must_use]
    pub fn from_chart(chart: &Chart) -> Self {
        Self {
            note_buckets: chart.note_buckets.clone(),
            event_buckets: chart.event_buckets.clone(),
        }
    }
}

impl ChunkSource for BucketSource {
    fn chunk(&self, beat: i64) -> Result<BeatChunk> {
        Ok(BeatChunk {
            beat,
            notes: self.note_buckets.get(&beat).cloned().unwrap_or_default(),
            events: self.event_buckets.get(&beat).cloned().unwrap_or_default(),
        })
    }

    fn beat_range(&self) -> Range<i64> {
        let keys = || self.note_buckets.keys().chain(self.event_buckets.keys());
        let first = keys().min().copied().unwrap_or(0).min(0);
        let last = keys().max().copied().unwrap_or(-1);
        first..last + 1
    }
}

enum Request {
    Refill,
    Shutdown,
}

type Slots = Arc<[Mutex<Option<BeatChunk>>]>;

/// Ring of prepared beat chunks fed by a worker thread.
#[derive(Debug)]
pub struct BeatRing {
    slots: Slots,
    range: Range<i64>,
    next: i64,
    stalls: usize,
    requests: Sender<Request>,
    errors: Receiver<ChartError>,
    worker: Option<JoinHandle<()>>,
}

impl BeatRing {
    /// Starts a worker serving `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::Io`] if the thread cannot be spawned.
    pub fn spawn<S: ChunkSource + 'static>(source: S, config: &RingConfig) -> Result<Self> {
        let capacity = config.capacity.max(1);
        let slots: Slots = (0..capacity).map(|_| Mutex::new(None)).collect();
        let range = source.beat_range();
        let (requests, request_rx) = unbounded();
        let (error_tx, errors) = unbounded();
        let worker = Worker {
            source,
            slots: Arc::clone(&slots),
            range: range.clone(),
            requests: request_rx,
            errors: error_tx,
        };
        let handle = thread::Builder::new()
            .name("judgeline-dispatch".into())
            .spawn(move || worker.run())?;
        debug!(
            "dispatch ring of {capacity} slots serving beats {}..{}",
            range.start, range.end
        );
        Ok(Self {
            slots,
            next: range.start,
            range,
            stalls: 0,
            requests,
            errors,
            worker: Some(handle),
        })
    }

    /// The next beat [`BeatRing::take_next`] delivers.
    #[must_use]
    pub const fn next_beat(&self) -> i64 {
        self.next
    }

    /// Whether every beat was delivered.
    #[must_use]
    pub const fn is_drained(&self) -> bool {
        self.next >= self.range.end
    }

    /// How many times the consumer found its slot empty.
    #[must_use]
    pub const fn stalls(&self) -> usize {
        self.stalls
    }

    /// Takes the chunk of the next beat, waiting for the worker if needed.
    /// Returns `None` after the last beat.
    ///
    /// # Errors
    ///
    /// Returns the worker's error if it failed to build a chunk, or
    /// [`ChartError::WorkerStopped`] if it exited.
    pub fn take_next(&mut self) -> Result<Option<BeatChunk>> {
        if self.is_drained() {
            return Ok(None);
        }
        let slot = slot_of(&self.slots, self.range.start, self.next);
        let ready = self.slots[slot].lock().take();
        if let Some(chunk) = ready {
            return Ok(Some(self.delivered(chunk)));
        }

        self.stalls += 1;
        warn!("beat {} is not prepared yet, waiting for the dispatch worker", self.next);
        let _ = self.requests.send(Request::Refill);
        loop {
            let ready = self.slots[slot].lock().take();
            if let Some(chunk) = ready {
                return Ok(Some(self.delivered(chunk)));
            }
            match self.errors.try_recv() {
                Ok(err) => {
                    error!("dispatch worker failed at beat {}: {err}", self.next);
                    return Err(err);
                }
                Err(TryRecvError::Disconnected) if self.slots[slot].lock().is_none() => {
                    return Err(ChartError::WorkerStopped { beat: self.next });
                }
                Err(_) => thread::yield_now(),
            }
        }
    }

    /// Errors the worker reported since the last call, without waiting.
    pub fn drain_errors(&self) -> Vec<ChartError> {
        self.errors.try_iter().collect()
    }

    fn delivered(&mut self, chunk: BeatChunk) -> BeatChunk {
        self.next += 1;
        let _ = self.requests.send(Request::Refill);
        chunk
    }

    /// Stops the worker and waits for it to exit.
    pub fn shutdown(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            error!("dispatch worker panicked");
        }
    }
}

impl Drop for BeatRing {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn slot_of(slots: &[Mutex<Option<BeatChunk>>], first: i64, beat: i64) -> usize {
    (beat - first).rem_euclid(slots.len() as i64) as usize
}

struct Worker<S> {
    source: S,
    slots: Slots,
    range: Range<i64>,
    requests: Receiver<Request>,
    errors: Sender<ChartError>,
}

impl<S: ChunkSource> Worker<S> {
    fn run(self) {
        let mut beat = self.range.start;
        loop {
            match self.requests.try_recv() {
                Ok(Request::Shutdown) | Err(TryRecvError::Disconnected) => return,
                Ok(Request::Refill) | Err(TryRecvError::Empty) => {}
            }
            if beat < self.range.end {
                let slot = &self.slots[slot_of(&self.slots, self.range.start, beat)];
                if slot.lock().is_none() {
                    match self.source.chunk(beat) {
                        Ok(chunk) => {
                            *slot.lock() = Some(chunk);
                            beat += 1;
                            continue;
                        }
                        Err(err) => {
                            warn!("dispatch worker could not prepare beat {beat}: {err}");
                            if self.errors.send(err).is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            // Full, finished or failed: sleep until the consumer asks again.
            match self.requests.recv() {
                Ok(Request::Refill) => {}
                Ok(Request::Shutdown) | Err(_) => return,
            }
        }
    }
}
