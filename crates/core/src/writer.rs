use crate::cancel::CancellationFlag;
use crate::config::WriteOptions;
use crate::error::ChunkWriteError;
use crate::models::{Chunk, ChunkWriteOutcome};
use crate::store::ChunkItem;
use crate::traits::ChunkStore;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const CANCELLED_REASON: &str = "cancelled";
const UNPROCESSED_REASON: &str = "left unprocessed by the store";

/// Persists chunks in store-sized batches, retrying the items a batch could not write.
pub struct BatchWriter {
    store: Arc<dyn ChunkStore>,
    options: WriteOptions,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn ChunkStore>, options: WriteOptions) -> Self {
        Self { store, options }
    }

    /// Writes every chunk and returns one outcome per chunk, in sequence order.
    ///
    /// Batches run concurrently up to `max_in_flight`. Written items are never
    /// rolled back; items still failing after `max_attempts` are reported as
    /// failed. Once `cancel` fires no new request is issued and the remaining
    /// chunks are reported as cancelled.
    pub async fn write_chunks(
        &self,
        table: &str,
        chunks: &[Chunk],
        cancel: &CancellationFlag,
    ) -> Vec<ChunkWriteOutcome> {
        if chunks.is_empty() {
            return Vec::new();
        }

        let batch_size = self.options.batch_size.max(1);
        info!(
            table,
            chunks = chunks.len(),
            batch_size,
            "writing chunks"
        );

        // collected first so the returned future stays `Send`
        let batches = chunks
            .chunks(batch_size)
            .map(|batch| self.write_batch(table, batch, cancel))
            .collect::<Vec<_>>();

        let mut outcomes = stream::iter(batches)
            .buffer_unordered(self.options.max_in_flight.max(1))
            .collect::<Vec<Vec<_>>>()
            .await
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

        outcomes.sort_by_key(|(sequence_index, _)| *sequence_index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn write_batch(
        &self,
        table: &str,
        batch: &[Chunk],
        cancel: &CancellationFlag,
    ) -> Vec<(u64, ChunkWriteOutcome)> {
        let mut outcomes = Vec::with_capacity(batch.len());
        let mut pending = batch.iter().collect::<Vec<_>>();
        let mut reason = CANCELLED_REASON.to_string();

        for attempt in 1..=self.options.max_attempts {
            if cancel.is_cancelled() {
                reason = CANCELLED_REASON.to_string();
                break;
            }

            let items = pending
                .iter()
                .map(|chunk| ChunkItem::from(*chunk))
                .collect::<Vec<_>>();

            match self.store.batch_put(table, &items).await {
                Ok(unprocessed) => {
                    let unprocessed = unprocessed.into_iter().collect::<HashSet<_>>();
                    let (retry, written): (Vec<&Chunk>, Vec<&Chunk>) = pending
                        .into_iter()
                        .partition(|chunk| unprocessed.contains(&chunk.key));

                    outcomes.extend(written.into_iter().map(|chunk| {
                        (
                            chunk.sequence_index,
                            ChunkWriteOutcome::Written {
                                key: chunk.key.clone(),
                                sequence_index: chunk.sequence_index,
                            },
                        )
                    }));
                    pending = retry;
                    reason = UNPROCESSED_REASON.to_string();
                }
                Err(error) => {
                    warn!(table, attempt, %error, items = items.len(), "batch write request failed");
                    reason = error.to_string();
                }
            }

            if pending.is_empty() {
                break;
            }

            if attempt < self.options.max_attempts {
                let delay = backoff_delay(self.options.initial_backoff, attempt);
                debug!(
                    table,
                    attempt,
                    remaining = pending.len(),
                    delay_ms = delay.as_millis() as u64,
                    "retrying unwritten items"
                );
                tokio::time::sleep(delay).await;
            }
        }

        for chunk in pending {
            warn!(table, key = %chunk.key, %reason, "chunk write failed permanently");
            outcomes.push((
                chunk.sequence_index,
                ChunkWriteOutcome::Failed(ChunkWriteError {
                    chunk_key: chunk.key.clone(),
                    reason: reason.clone(),
                }),
            ));
        }

        outcomes
    }
}

/// `initial * 2^(attempt - 1)`, saturating instead of overflowing.
fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    initial.saturating_mul(factor)
}
