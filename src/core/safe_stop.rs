use std::time::Duration;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Cooperative stop flag shared by the scheduler, its timer and every virtual user.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    token: CancellationToken,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// A signal that fires with this one but can also be fired alone.
    pub fn child(&self) -> StopSignal {
        StopSignal {
            token: self.token.child_token(),
        }
    }

    /// Sleep for `duration` unless the signal fires first. Returns `false` when interrupted.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_child_follows_parent() {
        let parent = StopSignal::new();
        let child = parent.child();
        assert!(!child.is_triggered());
        parent.trigger();
        assert!(child.is_triggered());
    }

    #[tokio::test]
    async fn test_child_alone_does_not_stop_parent() {
        let parent = StopSignal::new();
        let child = parent.child();
        child.trigger();
        assert!(!parent.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted() {
        let signal = StopSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });
        assert!(!signal.sleep(Duration::from_secs(60)).await);
        assert!(!signal.sleep(Duration::from_secs(1)).await);
    }
}
