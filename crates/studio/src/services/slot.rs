//! Per-operation in-flight guard.
//!
//! A slot admits one call at a time. [`OperationSlot::try_begin`] hands out
//! a [`SlotGuard`] that owns a child cancellation token; dropping the guard
//! frees the slot on every exit path, including errors and cancelled
//! futures.

use std::future::Future;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Why a guarded call did not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The token was cancelled.
    Cancelled,
    /// The deadline passed.
    TimedOut(Duration),
}

/// One operation's in-flight state.
#[derive(Debug, Default)]
pub struct OperationSlot {
    busy: AtomicBool,
    token: Mutex<Option<CancellationToken>>,
}

impl OperationSlot {
    /// Claim the slot. Returns `None` if a call is already in flight.
    pub fn try_begin(&self, parent: &CancellationToken) -> Option<SlotGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let token = parent.child_token();
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Some(SlotGuard { slot: self, token })
    }

    /// Whether a call is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Cancel the in-flight call, if any. Returns whether one was cancelled.
    pub fn abort(&self) -> bool {
        let guard = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().is_some_and(|token| {
            token.cancel();
            true
        })
    }
}

/// Proof that the holder owns an [`OperationSlot`].
#[derive(Debug)]
pub struct SlotGuard<'a> {
    slot: &'a OperationSlot,
    token: CancellationToken,
}

impl SlotGuard<'_> {
    /// Token cancelled by [`OperationSlot::abort`] or the parent.
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Drive `future` until it finishes, the token is cancelled, or
    /// `timeout` elapses. An abandoned future is dropped, which aborts its
    /// HTTP request.
    pub async fn run<F, T>(&self, timeout: Duration, future: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        run_cancellable(&self.token, timeout, future).await
    }
}

/// Drive `future` under `token` and a deadline, without claiming a slot.
pub async fn run_cancellable<F, T>(
    token: &CancellationToken,
    timeout: Duration,
    future: F,
) -> Result<T, Interrupted>
where
    F: Future<Output = T>,
{
    tokio::select! {
        () = token.cancelled() => Err(Interrupted::Cancelled),
        result = tokio::time::timeout(timeout, future) => {
            result.map_err(|_| Interrupted::TimedOut(timeout))
        }
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        *self
            .slot
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.slot.busy.store(false, Ordering::Release);
    }
}
