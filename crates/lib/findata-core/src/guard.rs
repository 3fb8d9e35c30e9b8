//! Admission and translation boundary around every named operation.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{Instrument, info, info_span, warn};

use crate::access::AccessContext;
use crate::envelope::{Meta, Payload, ToolEnvelope};
use crate::error::{CoreError, CoreResult, ErrorCode};
use crate::metrics::round_to;
use crate::ratelimit::RateLimiter;
use crate::services::{Session, SessionManager};
use crate::store::{RecordStore, StoreError};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs operations as: rate-limit check, session acquisition, bounded work
/// under a timeout, then envelope translation.
pub struct ToolInvocationGuard<S> {
    limiter: RateLimiter,
    sessions: SessionManager<S>,
    call_timeout: Duration,
}

impl<S> Clone for ToolInvocationGuard<S> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            sessions: self.sessions.clone(),
            call_timeout: self.call_timeout,
        }
    }
}

impl<S: RecordStore> ToolInvocationGuard<S> {
    #[must_use]
    pub const fn new(limiter: RateLimiter, sessions: SessionManager<S>) -> Self {
        Self {
            limiter,
            sessions,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    #[must_use]
    pub const fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionManager<S> {
        &self.sessions
    }

    /// Invokes `call` for `tool` on behalf of `access`.
    ///
    /// A rate-limit rejection returns before any session is acquired. The
    /// session handed to `call` is released when the call finishes, fails, or
    /// is abandoned on timeout.
    pub async fn invoke<T, F, Fut>(&self, tool: &str, access: &AccessContext, call: F) -> ToolEnvelope<T>
    where
        T: Payload,
        F: FnOnce(Session<S>) -> Fut,
        Fut: Future<Output = CoreResult<T>>,
    {
        let caller = access.caller_key();
        let span = info_span!("tool", tool, caller = %caller, role = %access.role());
        let started = Instant::now();
        let outcome = self
            .run(tool, &caller, access, call)
            .instrument(span.clone())
            .await;
        let execution_ms = round_to(started.elapsed().as_secs_f64() * 1_000.0, 2);
        let _entered = span.enter();
        match outcome {
            Ok(data) => {
                let row_count = data.row_count();
                info!(execution_ms, row_count, "tool call completed");
                ToolEnvelope::success(
                    tool,
                    data,
                    Meta {
                        execution_ms,
                        row_count,
                    },
                )
            }
            Err(err) => {
                if err.code() == ErrorCode::StoreError {
                    warn!(execution_ms, error = %err, "tool call failed in store");
                } else {
                    info!(execution_ms, code = %err.code(), error = %err, "tool call rejected");
                }
                ToolEnvelope::failure(
                    tool,
                    &err,
                    Meta {
                        execution_ms,
                        row_count: None,
                    },
                )
            }
        }
    }

    async fn run<T, F, Fut>(&self, tool: &str, caller: &str, access: &AccessContext, call: F) -> CoreResult<T>
    where
        F: FnOnce(Session<S>) -> Fut,
        Fut: Future<Output = CoreResult<T>>,
    {
        self.limiter.check(tool, caller)?;
        let work = async {
            let session = self.sessions.acquire(access.clone()).await?;
            call(session).await
        };
        match tokio::time::timeout(self.call_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Store(StoreError::Timeout(self.call_timeout))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::ratelimit::{ManualClock, RateLimit, RateLimitConfig};
    use crate::store::memory::MemoryRecordStore;

    fn guard(limit: u32, max_sessions: usize) -> ToolInvocationGuard<MemoryRecordStore> {
        let limiter = RateLimiter::with_clock(
            RateLimitConfig::new(RateLimit::new(limit, 60)),
            Arc::new(ManualClock::new()),
        );
        let sessions = SessionManager::new(Arc::new(MemoryRecordStore::new()), max_sessions);
        ToolInvocationGuard::new(limiter, sessions)
    }

    #[tokio::test]
    async fn success_is_wrapped_with_row_count() {
        let guard = guard(5, 1);
        let envelope = guard
            .invoke("search_companies", &AccessContext::anonymous(), |_session| async {
                Ok(vec![1, 2, 3])
            })
            .await;
        assert!(envelope.ok);
        assert_eq!(envelope.data, Some(vec![1, 2, 3]));
        assert_eq!(envelope.meta.row_count, Some(3));
        assert!(envelope.error.is_none());
    }

    #[tokio::test]
    async fn rate_limited_calls_never_reach_the_store() {
        let guard = guard(1, 1);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        for _ in 0..3 {
            let _ = guard
                .invoke("health", &AccessContext::anonymous(), |_session| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(String::from("ok"))
                })
                .await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let envelope = guard
            .invoke("health", &AccessContext::anonymous(), |_session| async {
                Ok(String::from("ok"))
            })
            .await;
        assert_eq!(envelope.error_code(), Some(ErrorCode::RateLimitExceeded));
        assert!(envelope.error.unwrap().retry_after.unwrap() > 0);
        assert_eq!(guard.sessions().available(), 1);
    }

    #[tokio::test]
    async fn errors_release_the_session() {
        let guard = guard(10, 1);
        let envelope: ToolEnvelope<String> = guard
            .invoke("get_company_profile", &AccessContext::anonymous(), |_session| async {
                Err(CoreError::not_found("company", "NOPE"))
            })
            .await;
        assert_eq!(envelope.error_code(), Some(ErrorCode::NotFound));
        assert_eq!(guard.sessions().available(), 1);
    }

    #[tokio::test]
    async fn timeouts_report_store_errors_and_release_the_session() {
        let guard = guard(10, 1).with_call_timeout(Duration::from_millis(20));
        let envelope: ToolEnvelope<String> = guard
            .invoke("get_stock_price_history", &AccessContext::anonymous(), |_session| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(String::new())
            })
            .await;
        assert_eq!(envelope.error_code(), Some(ErrorCode::StoreError));
        assert_eq!(guard.sessions().available(), 1);
    }

    #[tokio::test]
    async fn session_carries_the_callers_context() {
        let guard = guard(10, 1);
        let envelope = guard
            .invoke("help", &AccessContext::user("u-9"), |session| async move {
                Ok(session.access().caller_key())
            })
            .await;
        assert_eq!(envelope.data.as_deref(), Some("user:u-9"));
    }
}
