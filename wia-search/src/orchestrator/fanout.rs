//! Bounded-concurrency dispatch of one query to many sources.
//!
//! Every unit runs on its own task and reports through an mpsc channel.
//! Each task owns a sender clone, so the channel closes once the last unit
//! has finished and the drain loop ends without a separate closer. A
//! semaphore caps how many units talk to the network at once.
//!
//! Units complete in any order. Results are handed back sorted by the
//! unit's registration index.
//!
//! Dropping the [`fan_out`] future cancels every unit that is still queued
//! or in flight.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};

use crate::context::SearchContext;
use crate::error::SourceError;

/// A pending collaborator call producing items of type `T`.
pub(crate) type SourceCall<T> =
    Pin<Box<dyn Future<Output = Result<Vec<T>, SourceError>> + Send + 'static>>;

pub(crate) struct Unit<T> {
    pub source: String,
    pub call: SourceCall<T>,
}

impl<T> Unit<T> {
    pub fn new(source: impl Into<String>, call: SourceCall<T>) -> Self {
        Self {
            source: source.into(),
            call,
        }
    }
}

/// Outcome of one unit.
#[derive(Debug)]
pub(crate) struct SourceResult<T> {
    pub index: usize,
    pub source: String,
    pub outcome: Result<Vec<T>, SourceError>,
}

/// Run `units` with at most `max_concurrent` in flight.
///
/// Waiting for a permit and the call itself both honour `ctx`. A unit whose
/// task dies without reporting is returned as [`SourceError::Aborted`].
/// Units run under a child of `ctx` that is cancelled once this future
/// completes or is dropped.
pub(crate) async fn fan_out<T>(
    units: Vec<Unit<T>>,
    ctx: &SearchContext,
    max_concurrent: usize,
) -> Vec<SourceResult<T>>
where
    T: Send + 'static,
{
    let scope = ctx.child();
    let _cancel_on_drop = scope.drop_guard();
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let (tx, mut rx) = mpsc::channel(units.len().max(1));
    let mut names = Vec::with_capacity(units.len());

    for (index, Unit { source, call }) in units.into_iter().enumerate() {
        names.push(source.clone());
        let tx = tx.clone();
        let semaphore = Arc::clone(&semaphore);
        let ctx = scope.clone();

        tokio::spawn(async move {
            let permit = ctx
                .run(async {
                    semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| SourceError::Cancelled)
                })
                .await;
            let outcome = match permit {
                Ok(_permit) => ctx.run(call).await,
                Err(err) => Err(err),
            };
            // Nobody is listening once the search was dropped.
            let _ = tx
                .send(SourceResult {
                    index,
                    source,
                    outcome,
                })
                .await;
        });
    }
    drop(tx);

    let mut slots: Vec<Option<SourceResult<T>>> = names.iter().map(|_| None).collect();
    while let Some(result) = rx.recv().await {
        let index = result.index;
        slots[index] = Some(result);
    }

    slots
        .into_iter()
        .zip(names)
        .enumerate()
        .map(|(index, (slot, source))| {
            slot.unwrap_or(SourceResult {
                index,
                source,
                outcome: Err(SourceError::Aborted),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ready(values: Vec<u32>) -> SourceCall<u32> {
        Box::pin(async move { Ok(values) })
    }

    fn delayed(ms: u64, values: Vec<u32>) -> SourceCall<u32> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(values)
        })
    }

    #[tokio::test]
    async fn no_units_yields_nothing() {
        let results = fan_out::<u32>(vec![], &SearchContext::new(), 4).await;
        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn results_follow_registration_order() {
        let units = vec![
            Unit::new("slow", delayed(30, vec![1])),
            Unit::new("fast", delayed(10, vec![2])),
            Unit::new("instant", ready(vec![3])),
        ];
        let results = fan_out(units, &SearchContext::new(), 4).await;
        let names: Vec<&str> = results.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast", "instant"]);
        assert!(results.iter().all(|r| r.outcome.is_ok()));
    }

    #[tokio::test]
    async fn failures_are_reported_per_unit() {
        let failing: SourceCall<u32> = Box::pin(async { Err::<Vec<u32>, _>(SourceError::Status(500)) });
        let units = vec![Unit::new("ok", ready(vec![1, 2])), Unit::new("bad", failing)];
        let results = fan_out(units, &SearchContext::new(), 2).await;
        assert_eq!(results[0].outcome.as_ref().map(Vec::len).ok(), Some(2));
        assert!(matches!(results[1].outcome, Err(SourceError::Status(500))));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_turns_into_timeouts() {
        let ctx = SearchContext::with_timeout(Duration::from_millis(50));
        let units = vec![
            Unit::new("quick", ready(vec![1])),
            Unit::new("stuck", delayed(10_000, vec![2])),
        ];
        let results = fan_out(units, &ctx, 2).await;
        assert!(results[0].outcome.is_ok());
        assert!(matches!(results[1].outcome, Err(SourceError::Timeout)));
    }

    #[tokio::test]
    async fn panicking_unit_reported_as_aborted() {
        async fn explode() -> Result<Vec<u32>, SourceError> {
            panic!("adapter bug")
        }
        let units = vec![
            Unit::new("boom", Box::pin(explode()) as SourceCall<u32>),
            Unit::new("ok", ready(vec![1])),
        ];
        let results = fan_out(units, &SearchContext::new(), 2).await;
        assert_eq!(results[0].source, "boom");
        assert!(matches!(results[0].outcome, Err(SourceError::Aborted)));
        assert!(results[1].outcome.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_fan_out_stops_running_and_queued_units() {
        let finished = Arc::new(AtomicUsize::new(0));
        let units = (0..3)
            .map(|i| {
                let finished = Arc::clone(&finished);
                let call: SourceCall<u32> = Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![i])
                });
                Unit::new(format!("slow-{i}"), call)
            })
            .collect();

        let ctx = SearchContext::new();
        let outcome =
            tokio::time::timeout(Duration::from_secs(1), fan_out(units, &ctx, 1)).await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert!(!ctx.is_cancelled(), "caller context is left alone");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_capped() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let units = (0..6)
            .map(|i| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                let call: SourceCall<u32> = Box::pin(async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(vec![i])
                });
                Unit::new(format!("source-{i}"), call)
            })
            .collect();

        let results = fan_out(units, &SearchContext::new(), 2).await;
        assert_eq!(results.len(), 6);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }
}
