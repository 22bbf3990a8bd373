//! Partition fan-out.
//!
//! Runs one listing stream per partition with bounded concurrency and merges
//! the items into a single stream without collecting them.

use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use ods_error::{OdsError, Result, ScanError};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Configuration for partition fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanOutConfig {
    /// Maximum partitions listed at the same time; `<= 1` lists sequentially.
    pub concurrency: usize,
    /// Capacity of the shared item buffer between partitions and the consumer.
    pub buffer_capacity: usize,
    /// Keep listing other partitions after one fails (true) or stop (false).
    pub continue_on_error: bool,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            buffer_capacity: 256,
            continue_on_error: true,
        }
    }
}

impl FanOutConfig {
    /// Create a new fan-out configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum concurrent partitions.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the item buffer capacity.
    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    /// Set whether to continue on partition errors.
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.buffer_capacity == 0 {
            return Err("buffer_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

enum MergeEvent<T> {
    Item(T),
    Failed { partition: String, error: OdsError },
    Done { partition: String },
}

fn partition_failed(partition: String, error: OdsError) -> OdsError {
    ScanError::PartitionFailed {
        partition,
        source: Box::new(error),
    }
    .into()
}

/// Merge the listings of `partitions` into one stream.
///
/// `open` starts the listing of one partition. With `concurrency <= 1` or a
/// single partition the listings are concatenated in partition order.
/// Otherwise up to `concurrency` partitions are listed at once and items are
/// yielded as they arrive, with no ordering across partitions.
///
/// A failing partition yields one [`ScanError::PartitionFailed`] item. When
/// `continue_on_error` is set the remaining partitions carry on, otherwise
/// the stream ends after that item. The merger counts one completion signal
/// per dispatched partition; a partition task that disappears without one
/// yields [`ScanError::WorkerLost`] so the stream always terminates.
///
/// Nothing runs until the stream is polled, and dropping the stream aborts
/// every partition task still in flight.
pub fn merge_partitions<P, T, F>(
    partitions: Vec<P>,
    config: &FanOutConfig,
    open: F,
) -> BoxStream<'static, Result<T>>
where
    P: Display + Send + 'static,
    T: Send + 'static,
    F: Fn(P) -> BoxStream<'static, Result<T>> + Send + Sync + 'static,
{
    if config.concurrency <= 1 || partitions.len() <= 1 {
        sequential(partitions, config.continue_on_error, open)
    } else {
        concurrent(partitions, config.clone(), open)
    }
}

fn sequential<P, T, F>(
    partitions: Vec<P>,
    continue_on_error: bool,
    open: F,
) -> BoxStream<'static, Result<T>>
where
    P: Display + Send + 'static,
    T: Send + 'static,
    F: Fn(P) -> BoxStream<'static, Result<T>> + Send + Sync + 'static,
{
    stream! {
        'partitions: for partition in partitions {
            let label = partition.to_string();
            let mut items = open(partition);

            while let Some(item) = items.next().await {
                match item {
                    Ok(item) => yield Ok(item),
                    Err(error) => {
                        warn!(partition = %label, error = %error, "Partition failed");
                        yield Err(partition_failed(label, error));
                        if continue_on_error {
                            continue 'partitions;
                        }
                        break 'partitions;
                    }
                }
            }

            debug!(partition = %label, "Partition complete");
        }
    }
    .boxed()
}

fn concurrent<P, T, F>(
    partitions: Vec<P>,
    config: FanOutConfig,
    open: F,
) -> BoxStream<'static, Result<T>>
where
    P: Display + Send + 'static,
    T: Send + 'static,
    F: Fn(P) -> BoxStream<'static, Result<T>> + Send + Sync + 'static,
{
    stream! {
        let dispatched = partitions.len();
        let (tx, mut rx) = mpsc::channel(config.buffer_capacity.max(1));
        let semaphore = Arc::new(Semaphore::new(config.concurrency));
        let open = Arc::new(open);

        debug!(
            partitions = dispatched,
            concurrency = config.concurrency,
            "Starting partition fan-out"
        );

        // Owned by the stream: dropping it aborts whatever is still running.
        let mut tasks = JoinSet::new();

        for partition in partitions {
            let tx = tx.clone();
            let semaphore = semaphore.clone();
            let open = open.clone();

            tasks.spawn(async move {
                let label = partition.to_string();
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };

                let mut items = open(partition);
                while let Some(item) = items.next().await {
                    let event = match item {
                        Ok(item) => MergeEvent::Item(item),
                        Err(error) => {
                            let _ = tx.send(MergeEvent::Failed { partition: label, error }).await;
                            return;
                        }
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }

                let _ = tx.send(MergeEvent::Done { partition: label }).await;
            });
        }
        drop(tx);

        let mut finished = 0usize;
        while finished < dispatched {
            match rx.recv().await {
                Some(MergeEvent::Item(item)) => yield Ok(item),
                Some(MergeEvent::Done { partition }) => {
                    finished += 1;
                    debug!(partition = %partition, finished, dispatched, "Partition complete");
                }
                Some(MergeEvent::Failed { partition, error }) => {
                    finished += 1;
                    warn!(partition = %partition, error = %error, "Partition failed");
                    yield Err(partition_failed(partition, error));
                    if !config.continue_on_error {
                        break;
                    }
                }
                None => {
                    let lost = dispatched - finished;
                    warn!(lost, dispatched, "Partition tasks exited without completing");
                    yield Err(ScanError::WorkerLost(format!(
                        "{lost} of {dispatched} partitions exited without completing"
                    ))
                    .into());
                    break;
                }
            }
        }

        tasks.abort_all();
    }
    .boxed()
}
