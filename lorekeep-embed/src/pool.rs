//! Bounded-concurrency batch embedding
//!
//! [`EmbeddingPool`] is the one place large text lists get parallelized:
//! input is split into fixed-size sub-batches, each sub-batch becomes one
//! task bounded by a shared semaphore, and results are reassembled in input
//! order. The pool is passed explicitly to whoever needs it (no process-wide
//! singleton) and is closed exactly once at shutdown.

use crate::error::{EmbedError, Result};
use crate::provider::Embedder;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// Number of texts handed to the provider per sub-batch.
pub const SUB_BATCH_SIZE: usize = 5;

/// Bounded worker pool for batch embedding.
///
/// Cloning is cheap and shares the same permit budget, so one pool instance
/// created at startup bounds embedding concurrency across every caller in
/// the process. After [`close`](Self::close), new submissions fail with
/// [`EmbedError::PoolClosed`]; in-flight work is left to finish.
#[derive(Clone)]
pub struct EmbeddingPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl EmbeddingPool {
    /// Create a pool allowing `capacity` concurrent provider calls.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// The concurrency bound this pool was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Close the pool for shutdown. Idempotent.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Embed `texts` through `embedder`, parallelized over sub-batches.
    ///
    /// The output has one vector per input, `output[i]` corresponding to
    /// `texts[i]` regardless of which task processed it. The first error
    /// recorded by any sub-batch fails the whole call; tasks that have not
    /// started real work yet skip it once an error is set, while
    /// already-dispatched provider calls run to completion.
    pub async fn batch_embed(
        &self,
        embedder: Arc<dyn Embedder>,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if self.permits.is_closed() {
            return Err(EmbedError::PoolClosed);
        }

        let first_err: Arc<Mutex<Option<EmbedError>>> = Arc::new(Mutex::new(None));
        let mut tasks: JoinSet<Option<(usize, Vec<Vec<f32>>)>> = JoinSet::new();

        for (batch_index, chunk) in texts.chunks(SUB_BATCH_SIZE).enumerate() {
            let start = batch_index * SUB_BATCH_SIZE;
            let chunk = chunk.to_vec();
            let permits = Arc::clone(&self.permits);
            let embedder = Arc::clone(&embedder);
            let first_err = Arc::clone(&first_err);

            tasks.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        record_error(&first_err, EmbedError::PoolClosed);
                        return None;
                    }
                };
                // A sibling already failed; skip the provider call.
                if first_err.lock().unwrap().is_some() {
                    return None;
                }

                match embedder.batch_embed(&chunk).await {
                    Ok(vectors) if vectors.len() == chunk.len() => Some((start, vectors)),
                    Ok(vectors) => {
                        record_error(
                            &first_err,
                            EmbedError::malformed_response(format!(
                                "sub-batch returned {} vectors for {} inputs",
                                vectors.len(),
                                chunk.len()
                            )),
                        );
                        None
                    }
                    Err(err) => {
                        record_error(&first_err, err);
                        None
                    }
                }
            });
        }

        let mut output: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        while let Some(joined) = tasks.join_next().await {
            if let Some((start, vectors)) = joined? {
                for (offset, vector) in vectors.into_iter().enumerate() {
                    output[start + offset] = Some(vector);
                }
            }
        }

        if let Some(err) = first_err.lock().unwrap().take() {
            return Err(err);
        }

        debug!("embedded {} texts through the pool", texts.len());
        // Every slot is filled: each sub-batch either returned a vector per
        // input or recorded an error above.
        Ok(output
            .into_iter()
            .map(|slot| slot.expect("sub-batch result missing"))
            .collect())
    }
}

fn record_error(slot: &Mutex<Option<EmbedError>>, err: EmbedError) {
    let mut guard = slot.lock().unwrap();
    if guard.is_none() {
        *guard = Some(err);
    }
}
