//! Bounded-concurrency mapping
//!
//! [`map_bounded`] runs an async operation over every input with at most
//! `limit` operations in flight. Results come back in input order. Failures,
//! panics included, are recorded per input and never stop the batch.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::{FutureExt, StreamExt, stream};
use thiserror::Error;
use tracing::{debug, warn};

/// A per-item operation panicked instead of returning
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation panicked: {message}")]
pub struct OperationPanicked {
    pub message: String,
}

impl OperationPanicked {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self { message }
    }
}

/// Apply `op` to every input with at most `limit` invocations outstanding.
///
/// * The output has one entry per input, in input order.
/// * `on_progress(n)` is called once per completed input, after its result is
///   recorded, with `n` running from 1 to `inputs.len()` in completion order.
/// * An `Err` or a panic from `op` becomes that input's result; every other
///   input still runs to completion.
/// * `limit` of 0 is treated as 1. An empty input completes immediately
///   without calling `on_progress`.
pub async fn map_bounded<T, R, E, F, Fut, P>(
    inputs: Vec<T>,
    limit: usize,
    mut op: F,
    mut on_progress: P,
) -> Vec<Result<R, E>>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: From<OperationPanicked>,
    P: FnMut(usize),
{
    let total = inputs.len();
    if total == 0 {
        return Vec::new();
    }
    let limit = limit.max(1);
    debug!("Mapping {} inputs with concurrency limit {}", total, limit);

    let mut slots: Vec<Option<Result<R, E>>> = std::iter::repeat_with(|| None).take(total).collect();

    // `op` is called lazily as buffer_unordered pulls the next input, so at
    // most `limit` futures exist at any time.
    let mut in_flight = stream::iter(inputs.into_iter().enumerate())
        .map(|(index, input)| {
            let fut = AssertUnwindSafe(op(input)).catch_unwind();
            async move {
                let outcome = match fut.await {
                    Ok(result) => result,
                    Err(payload) => {
                        let panicked = OperationPanicked::from_payload(payload.as_ref());
                        warn!("Operation for input #{} panicked: {}", index, panicked.message);
                        Err(E::from(panicked))
                    }
                };
                (index, outcome)
            }
        })
        .buffer_unordered(limit);

    let mut completed = 0usize;
    while let Some((index, outcome)) = in_flight.next().await {
        slots[index] = Some(outcome);
        completed += 1;
        on_progress(completed);
    }

    let results: Vec<Result<R, E>> = slots.into_iter().flatten().collect();
    debug_assert_eq!(results.len(), total, "every input must yield exactly one result");
    results
}
