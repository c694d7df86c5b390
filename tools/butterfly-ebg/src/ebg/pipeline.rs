//! Ordered scatter/gather over batches of intersections
//!
//! Batches run on the worker pool, results come back over a channel in any
//! order and are merged strictly in batch order.

use butterfly_common::NodeId;
use std::collections::BTreeMap;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::error::{EbgError, Result};

/// Batches in flight per worker thread
pub const WINDOW_PER_THREAD: usize = 5;

/// Runs `process` over `0..total` in batches of `batch_size` with at most
/// `window` batches in flight, feeding the results to `merge` in batch
/// order.
///
/// The first failure stops new batches from being issued; batches already
/// running are drained and the failure of the lowest batch is returned.
pub(crate) fn run_ordered<T, P, M>(
    pool: &rayon::ThreadPool,
    total: NodeId,
    batch_size: NodeId,
    window: usize,
    process: P,
    mut merge: M,
) -> Result<()>
where
    T: Send,
    P: Fn(Range<NodeId>) -> Result<T> + Sync,
    M: FnMut(T) -> Result<()>,
{
    let batch_size = batch_size.max(1);
    let window = window.max(1);
    let batches = u64::from(total.div_ceil(batch_size));
    let (tx, rx) = crossbeam_channel::unbounded::<(u64, Result<T>)>();
    let process = &process;

    pool.in_place_scope_fifo(|scope| {
        let mut next_to_issue = 0u64;
        let mut next_to_merge = 0u64;
        let mut in_flight = 0usize;
        let mut pending: BTreeMap<u64, T> = BTreeMap::new();
        let mut failure: Option<(u64, EbgError)> = None;

        loop {
            while failure.is_none() && in_flight < window && next_to_issue < batches {
                let seq = next_to_issue;
                let start = (seq * u64::from(batch_size)) as NodeId;
                let end = start.saturating_add(batch_size).min(total);
                let tx = tx.clone();
                scope.spawn_fifo(move |_| {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| process(start..end)))
                        .unwrap_or(Err(EbgError::WorkerPanicked { batch: seq }));
                    // The receiver outlives every batch
                    let _ = tx.send((seq, result));
                });
                next_to_issue += 1;
                in_flight += 1;
            }

            if in_flight == 0 {
                break;
            }
            let Ok((seq, result)) = rx.recv() else {
                break;
            };
            in_flight -= 1;

            match result {
                Ok(value) => {
                    pending.insert(seq, value);
                }
                Err(err) => {
                    warn!(batch = seq, error = %err, "batch failed");
                    if failure.as_ref().map_or(true, |(failed, _)| seq < *failed) {
                        failure = Some((seq, err));
                    }
                }
            }

            if failure.is_none() {
                while let Some(value) = pending.remove(&next_to_merge) {
                    if let Err(err) = merge(value) {
                        failure = Some((next_to_merge, err));
                        break;
                    }
                    debug!(batch = next_to_merge, "merged batch");
                    next_to_merge += 1;
                }
            }
        }

        match failure {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    })
}
