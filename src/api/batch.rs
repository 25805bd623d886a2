use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_lock::Mutex;

use crate::error::{batch_full, SugarResult};
use crate::model::DocumentKey;
use crate::store::{DocumentStore, SetOptions, WriteOperation};
use crate::value::FieldMap;

/// The hard ceiling on writes per batch, matching the store's atomic-batch
/// limit.
pub const MAX_WRITES: usize = 500;

#[derive(Clone, Copy, Debug)]
pub struct BatchOptions {
    /// Commit automatically when the accumulator reaches [`MAX_WRITES`].
    pub commit_when_full: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            commit_when_full: true,
        }
    }
}

/// What an append produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Append {
    /// The write is recorded; `n` writes are pending. No I/O happened yet.
    Queued(usize),
    /// The append filled the batch and the automatic commit completed.
    Committed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Accumulating,
    Committing,
}

struct BatchState {
    writes: Vec<WriteOperation>,
    phase: Phase,
}

/// A bounded, atomically committed group of pending writes.
///
/// The handle is cheap to clone and keeps its identity across commits: after
/// a successful commit the accumulator is fresh and the same `Batch` keeps
/// accepting writes. Appends during an in-flight commit wait for it — the
/// accumulator resets only once the commit's I/O has resolved, so no write
/// queued in the commit window is lost.
///
/// A single accumulator is shared by every clone; writers that need
/// independent commit boundaries must use separate batches.
#[derive(Clone)]
pub struct Batch {
    store: Arc<dyn DocumentStore>,
    options: BatchOptions,
    state: Arc<Mutex<BatchState>>,
    pending: Arc<AtomicUsize>,
}

impl Batch {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_options(store, BatchOptions::default())
    }

    pub fn with_options(store: Arc<dyn DocumentStore>, options: BatchOptions) -> Self {
        Self {
            store,
            options,
            state: Arc::new(Mutex::new(BatchState {
                writes: Vec::new(),
                phase: Phase::Accumulating,
            })),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Current write count.
    pub fn writes(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Whether the batch has reached the maximum write count.
    pub fn full(&self) -> bool {
        self.writes() >= MAX_WRITES
    }

    /// Whether no writes are pending.
    pub fn empty(&self) -> bool {
        self.writes() == 0
    }

    pub async fn set(
        &self,
        key: &DocumentKey,
        data: FieldMap,
        options: SetOptions,
    ) -> SugarResult<Append> {
        self.push(WriteOperation::Set {
            key: key.clone(),
            data,
            options,
        })
        .await
    }

    pub async fn update(&self, key: &DocumentKey, data: FieldMap) -> SugarResult<Append> {
        self.push(WriteOperation::Update {
            key: key.clone(),
            data,
        })
        .await
    }

    pub async fn delete(&self, key: &DocumentKey) -> SugarResult<Append> {
        self.push(WriteOperation::Delete { key: key.clone() }).await
    }

    /// Commits all pending writes atomically. A no-op on an empty batch.
    pub async fn commit(&self) -> SugarResult<()> {
        let mut state = self.state.lock().await;
        self.commit_locked(&mut state).await
    }

    /// Records the write, then runs the overflow policy: below the cap the
    /// append resolves immediately; at the cap it either auto-commits (the
    /// append resolves with the commit's outcome) or fails with `BatchFull`
    /// while the write stays recorded.
    async fn push(&self, write: WriteOperation) -> SugarResult<Append> {
        let mut state = self.state.lock().await;
        state.writes.push(write);
        let count = state.writes.len();
        self.pending.store(count, Ordering::SeqCst);
        if count >= MAX_WRITES {
            if self.options.commit_when_full {
                log::debug!("batch reached {count} writes, auto-committing");
                self.commit_locked(&mut state).await?;
                return Ok(Append::Committed);
            }
            return Err(batch_full(format!(
                "batch holds {count} writes; commit before appending more"
            )));
        }
        Ok(Append::Queued(count))
    }

    async fn commit_locked(&self, state: &mut BatchState) -> SugarResult<()> {
        debug_assert_eq!(state.phase, Phase::Accumulating);
        if state.writes.is_empty() {
            return Ok(());
        }
        state.phase = Phase::Committing;
        let writes = state.writes.clone();
        let count = writes.len();
        let result = self.store.commit(writes).await;
        state.phase = Phase::Accumulating;
        match result {
            Ok(()) => {
                state.writes = Vec::new();
                self.pending.store(0, Ordering::SeqCst);
                log::debug!("batch committed {count} writes");
                Ok(())
            }
            // A failed commit keeps the accumulator so the caller can retry.
            Err(error) => Err(error),
        }
    }
}

impl Display for Batch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Batch({} pending)", self.writes())
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("writes", &self.writes())
            .field("commit_when_full", &self.options.commit_when_full)
            .finish()
    }
}
