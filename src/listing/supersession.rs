use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::AppError;

/// The fate of one listing query under supersession.
#[derive(Debug, PartialEq)]
pub enum Outcome<T> {
    /// This query was still the latest when it finished; apply its result.
    Applied(T),
    /// A newer query began while this one was in flight. The result (or
    /// error) is discarded and must not touch display state.
    Superseded,
}

impl<T> Outcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Superseded => None,
        }
    }
}

/// Ensures that when listing parameters change rapidly, only the most
/// recent query's result wins.
///
/// Correctness comes from the monotonic generation counter, not from
/// cancellation: superseded work may run to completion, its outcome is
/// simply never applied. Cancelling the underlying request is an
/// optimization left to callers.
#[derive(Debug, Default)]
pub struct QueryController {
    generation: AtomicU64,
}

impl QueryController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new query generation. Any generation issued earlier is
    /// superseded from this moment on.
    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The most recently issued generation.
    pub fn latest(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Run one query under the given generation. Errors from superseded
    /// queries are swallowed too: a stale failure must not surface over a
    /// newer query's state any more than a stale success may.
    pub async fn run<T, F>(&self, generation: u64, work: F) -> Result<Outcome<T>, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let result = work.await;
        if self.latest() != generation {
            return Ok(Outcome::Superseded);
        }
        result.map(Outcome::Applied)
    }
}
