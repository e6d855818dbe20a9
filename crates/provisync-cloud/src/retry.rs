//! Retrying operation executor
//!
//! Drives an operation on a fixed cadence until it completes, fails fatally,
//! or an overall timeout elapses. The first attempt fires immediately.

use crate::error::{OperationTimeout, RetryError};
use crate::remote::ClassifyError;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Smallest retry period the executor will tick at
pub const MIN_RETRY_PERIOD: Duration = Duration::from_millis(1);

/// Result of a single attempt, as reported by the operation
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// The operation completed; stop and return the value
    Done(T),
    /// Transient failure; try again on the next tick
    Retry,
    /// Fatal failure; stop and return the error
    Fail(E),
}

impl<T, E: ClassifyError> Attempt<T, E> {
    /// Busy errors are retried, any other error is fatal.
    pub fn from_result(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Attempt::Done(value),
            Err(e) if e.is_busy() => Attempt::Retry,
            Err(e) => Attempt::Fail(e),
        }
    }
}

/// Per-call record of attempt progress
#[derive(Debug)]
pub struct RetryContext<E> {
    description: String,
    iteration_count: u32,
    should_retry: bool,
    terminal_error: Option<E>,
}

impl<E: Display> RetryContext<E> {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            iteration_count: 0,
            should_retry: false,
            terminal_error: None,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of attempts started so far (1 during the first attempt)
    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn should_retry(&self) -> bool {
        self.should_retry
    }

    pub fn terminal_error(&self) -> Option<&E> {
        self.terminal_error.as_ref()
    }

    /// Request another attempt once the current one completes.
    pub(crate) fn retry(&mut self) {
        self.should_retry = true;
    }

    /// Mark the current attempt as failed.
    pub(crate) fn fail(&mut self, err: E) {
        if self.iteration_count > 1 {
            tracing::warn!(
                "{} (retry {}) failed: {}",
                self.description,
                self.iteration_count,
                err
            );
        } else {
            tracing::warn!("{} failed: {}", self.description, err);
        }
        self.terminal_error = Some(err);
    }

    /// Reset per-attempt state and count the attempt.
    pub(crate) fn next_iteration(&mut self) {
        self.should_retry = false;
        self.terminal_error = None;
        self.iteration_count += 1;
    }

    fn record<T>(&mut self, attempt: Attempt<T, E>) -> Option<T> {
        match attempt {
            Attempt::Done(value) => Some(value),
            Attempt::Retry => {
                self.retry();
                None
            }
            Attempt::Fail(err) => {
                self.fail(err);
                None
            }
        }
    }
}

/// Executes retriable operations at a fixed period.
///
/// The period is fixed at construction; build another executor for a
/// different cadence.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    retry_period: Duration,
}

impl RetryExecutor {
    pub fn new(retry_period: Duration) -> Self {
        Self {
            retry_period: retry_period.max(MIN_RETRY_PERIOD),
        }
    }

    pub fn retry_period(&self) -> Duration {
        self.retry_period
    }

    /// Perform `operation` until it succeeds, fails, or `timeout` elapses.
    ///
    /// The operation is handed the context of the attempt it is running in and
    /// reports its outcome through [`Attempt`]. A value published with
    /// [`Attempt::Done`] is returned to the caller.
    pub async fn action<T, E, F, Fut>(
        &self,
        description: &str,
        timeout: Duration,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        E: Display,
        F: FnMut(&RetryContext<E>) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        tracing::debug!(
            "{} - will attempt operation once every {:?} until successful (timeout after {:?})...",
            description,
            self.retry_period,
            timeout
        );

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval(self.retry_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut context = RetryContext::new(description);
        loop {
            tokio::select! {
                biased;

                _ = &mut deadline => {
                    tracing::warn!(
                        "{} - operation timed out after {:?} ({} attempts)",
                        description,
                        timeout,
                        context.iteration_count()
                    );

                    return Err(RetryError::Timeout(OperationTimeout {
                        description: description.to_string(),
                        timeout,
                        attempts: context.iteration_count(),
                    }));
                }

                _ = ticker.tick() => {
                    context.next_iteration();
                    tracing::debug!(
                        "{} - performing attempt {}...",
                        description,
                        context.iteration_count()
                    );

                    let attempt = operation(&context).await;
                    if let Some(value) = context.record(attempt) {
                        tracing::debug!(
                            "{} - operation successful after {} attempt(s).",
                            description,
                            context.iteration_count()
                        );
                        return Ok(value);
                    }

                    if let Some(err) = context.terminal_error.take() {
                        return Err(RetryError::Fatal(err));
                    }

                    tracing::debug!(
                        "{} - attempt {} marked for retry (will try again)...",
                        description,
                        context.iteration_count()
                    );
                }
            }
        }
    }
}
