//! Poll-until-present startup gate.

use std::time::Duration;

/// Blocks startup until a precondition holds.
///
/// There is no timeout: the service cannot run without what it waits for.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    what: &'static str,
    poll_interval: Duration,
}

impl ReadinessGate {
    pub fn new(what: &'static str, poll_interval: Duration) -> Self {
        Self { what, poll_interval }
    }

    /// Call `probe` until it yields a value, sleeping between attempts.
    pub async fn wait<T, P>(&self, mut probe: P) -> T
    where
        P: FnMut() -> Option<T>,
    {
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            if let Some(value) = probe() {
                tracing::info!(what = self.what, attempts, "Precondition ready");
                return value;
            }
            tracing::debug!(
                what = self.what,
                attempts,
                retry_secs = self.poll_interval.as_secs(),
                "Still waiting"
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn waits_n_times_then_returns() {
        let gate = ReadinessGate::new("value", Duration::from_secs(5));
        let mut calls = 0;
        let start = Instant::now();

        let got = gate
            .wait(|| {
                calls += 1;
                (calls == 4).then_some("ready")
            })
            .await;

        assert_eq!(got, "ready");
        assert_eq!(calls, 4);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn present_value_returns_without_sleeping() {
        let gate = ReadinessGate::new("value", Duration::from_secs(5));
        let start = Instant::now();
        assert_eq!(gate.wait(|| Some(7)).await, 7);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn never_ready_never_returns() {
        let gate = ReadinessGate::new("value", Duration::from_secs(5));
        let waited = tokio::time::timeout(Duration::from_secs(3600), gate.wait(|| None::<()>)).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn file_created_at_twelve_seconds_is_seen_on_fourth_poll() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.key");
        let writer_path = path.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            std::fs::write(writer_path, "s3cr3t").unwrap();
        });

        let start = Instant::now();
        let mut polls = 0;
        let gate = ReadinessGate::new("secret key", Duration::from_secs(5));
        let secret = gate
            .wait(|| {
                polls += 1;
                crate::security::probe_secret(&path)
            })
            .await;

        assert_eq!(secret.expose(), "s3cr3t");
        assert_eq!(polls, 4);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }
}
