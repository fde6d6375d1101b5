use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::ProcessingError;

/// Handle to a spawned background continuation.
///
/// Dropping it (or calling [`JobHandle::detach`]) leaves the continuation running.
/// The outcome is recorded on the owning record, never returned here.
#[derive(Debug)]
#[must_use = "call detach() to run in the background or settled() to wait"]
pub struct JobHandle {
    id: Uuid,
    task: JoinHandle<()>,
}

impl JobHandle {
    /// Runs `work` on the runtime, converts a panic into an error, and passes the
    /// outcome to `finish`.
    pub fn spawn<W, F, Fut>(id: Uuid, work: W, finish: F) -> Self
    where
        W: Future<Output = Result<(), ProcessingError>> + Send + 'static,
        F: FnOnce(Result<(), ProcessingError>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(ProcessingError::Internal(format!(
                    "processing task panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            };
            finish(outcome).await;
        });
        Self { id, task }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn detach(self) {
        drop(self.task);
    }

    /// Waits until the outcome has been recorded.
    pub async fn settled(self) {
        if let Err(e) = self.task.await {
            tracing::error!(id = %self.id, error = %e, "continuation task aborted");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn panics_become_errors() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let handle = JobHandle::spawn(
            Uuid::nil(),
            async {
                if Uuid::nil().is_nil() {
                    panic!("boom");
                }
                Ok(())
            },
            move |outcome| async move {
                *sink.lock().unwrap() = Some(outcome.map_err(|e| e.to_string()));
            },
        );
        handle.settled().await;

        let outcome = seen.lock().unwrap().take().unwrap();
        assert_eq!(outcome.unwrap_err(), "processing task panicked: boom");
    }

    #[tokio::test]
    async fn success_is_passed_through() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        JobHandle::spawn(Uuid::nil(), async { Ok(()) }, move |outcome| async move {
            *sink.lock().unwrap() = Some(outcome.is_ok());
        })
        .settled()
        .await;
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }
}
