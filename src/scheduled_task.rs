use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use rocket::tokio::{
    self,
    task::{JoinError, JoinHandle},
    time::Duration,
};

/// A task that runs at a specific future instant, unless cancelled first.
/// A `run_at` in the past runs the task immediately.
pub struct ScheduledTask<T> {
    handle: JoinHandle<T>,
}

impl<T> ScheduledTask<T>
where
    T: Send + 'static,
{
    pub fn new<Fut>(task: Fut, run_at: DateTime<Utc>) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let sleep_for = until(run_at);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(sleep_for).await;
            task.await
        });

        Self { handle }
    }

    /// Cancel the task. Returns true iff it had already run to completion.
    pub async fn cancel(self) -> bool {
        self.handle.abort();
        self.handle.await.is_ok()
    }
}

impl<T> Future for ScheduledTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}

/// Time from now until `datetime`, saturating to zero for past instants.
fn until(datetime: DateTime<Utc>) -> Duration {
    let millis = datetime.timestamp_millis() - Utc::now().timestamp_millis();
    Duration::from_millis(u64::try_from(millis).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn runs_immediately_when_scheduled_in_the_past() {
        let task = ScheduledTask::new(async { 42 }, Utc::now() - chrono::Duration::hours(1));
        assert_eq!(task.await.unwrap(), 42);
    }

    #[rocket::async_test]
    async fn cancel_before_running() {
        let task = ScheduledTask::new(async {}, Utc::now() + chrono::Duration::hours(1));
        assert!(!task.cancel().await);
    }
}
