//! Timeout isolation for a single procedure call
//!
//! Every procedure invocation runs under a child of the caller's
//! cancellation token plus its own timeout. Whatever goes wrong inside the
//! procedure (timeout, failure, panic, wrong identity) becomes an `Error`
//! result; only the caller's own cancellation escapes as `Err`.

use crate::error::{ProcedureError, SpikehoundError};
use crate::procedure::Procedure;
use futures::FutureExt;
use spikehound_model::{Clock, ProcedureId, ProcedureResult};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run `procedure` as `expected`, isolated by `timeout`
///
/// The returned result always carries `expected` as its identity and is
/// stamped with the wall-clock start and end of this call.
pub async fn run_isolated<I, O>(
    expected: ProcedureId,
    procedure: &dyn Procedure<I, O>,
    input: &I,
    timeout: Duration,
    parent: &CancellationToken,
    clock: &dyn Clock,
) -> Result<ProcedureResult<O>, SpikehoundError>
where
    I: Sync + ?Sized,
    O: Send,
{
    if parent.is_cancelled() {
        return Err(SpikehoundError::Cancelled);
    }

    let started_at = clock.now();
    let child = parent.child_token();
    let guarded = AssertUnwindSafe(procedure.run(input, child.clone())).catch_unwind();

    let outcome = tokio::select! {
        biased;
        () = parent.cancelled() => {
            debug!(procedure = %expected, "procedure_cancelled_by_caller");
            return Err(SpikehoundError::Cancelled);
        }
        outcome = tokio::time::timeout(timeout, guarded) => outcome,
    };
    // Anything still listening on the child token must stop now.
    child.cancel();

    let finished_at = clock.now();
    let failed = |message: String| -> ProcedureResult<O> {
        warn!(procedure = %expected, error = %message, "procedure_failed");
        ProcedureResult::error(expected, started_at, finished_at, message)
    };

    let result = match outcome {
        Err(_elapsed) => failed(format!("{expected} procedure timed out after {timeout:?}")),
        Ok(Err(panic)) => failed(format!(
            "{expected} procedure panicked: {}",
            panic_message(panic.as_ref())
        )),
        Ok(Ok(Err(ProcedureError::Cancelled))) => {
            if parent.is_cancelled() {
                return Err(SpikehoundError::Cancelled);
            }
            failed(format!("{expected} procedure was cancelled"))
        }
        Ok(Ok(Err(ProcedureError::Failed(message)))) => {
            failed(format!("{expected} procedure failed: {message}"))
        }
        Ok(Ok(Ok(result))) if result.procedure != expected => failed(format!(
            "{expected} procedure returned unexpected procedure id {}",
            result.procedure
        )),
        Ok(Ok(Ok(result))) => {
            debug!(procedure = %expected, status = ?result.status, "procedure_completed");
            result.restamped(started_at, finished_at)
        }
    };

    Ok(result)
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikehound_model::{ProcedureStatus, SystemClock};

    struct Fixed(ProcedureId);

    #[async_trait::async_trait]
    impl Procedure<(), u32> for Fixed {
        async fn run(
            &self,
            _input: &(),
            _cancel: CancellationToken,
        ) -> Result<ProcedureResult<u32>, ProcedureError> {
            let now = chrono::Utc::now();
            Ok(ProcedureResult::ok(self.0, now, now, 1))
        }
    }

    struct Hangs;

    #[async_trait::async_trait]
    impl Procedure<(), u32> for Hangs {
        async fn run(
            &self,
            _input: &(),
            _cancel: CancellationToken,
        ) -> Result<ProcedureResult<u32>, ProcedureError> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    struct Panics;

    #[async_trait::async_trait]
    impl Procedure<(), u32> for Panics {
        async fn run(
            &self,
            _input: &(),
            _cancel: CancellationToken,
        ) -> Result<ProcedureResult<u32>, ProcedureError> {
            panic!("bad plugin")
        }
    }

    async fn run(
        procedure: &dyn Procedure<(), u32>,
        cancel: &CancellationToken,
    ) -> Result<ProcedureResult<u32>, SpikehoundError> {
        run_isolated(
            ProcedureId::Cost,
            procedure,
            &(),
            Duration::from_millis(50),
            cancel,
            &SystemClock,
        )
        .await
    }

    #[tokio::test]
    async fn passes_through_matching_result() {
        let result = run(&Fixed(ProcedureId::Cost), &CancellationToken::new()).await.unwrap();
        assert_eq!(result.status, ProcedureStatus::Ok);
        assert_eq!(result.data, Some(1));
    }

    #[tokio::test]
    async fn identity_mismatch_is_error() {
        let result = run(&Fixed(ProcedureId::History), &CancellationToken::new()).await.unwrap();
        assert_eq!(result.procedure, ProcedureId::Cost);
        assert!(result.is_error());
        assert_eq!(
            result.first_error(),
            Some("cost procedure returned unexpected procedure id history")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_error_naming_duration() {
        let result = run(&Hangs, &CancellationToken::new()).await.unwrap();
        assert!(result.is_error());
        assert_eq!(result.first_error(), Some("cost procedure timed out after 50ms"));
    }

    #[tokio::test]
    async fn panic_is_error() {
        let result = run(&Panics, &CancellationToken::new()).await.unwrap();
        assert!(result.is_error());
        assert_eq!(result.first_error(), Some("cost procedure panicked: bad plugin"));
    }

    #[tokio::test]
    async fn caller_cancellation_escapes() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run(&Hangs, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
