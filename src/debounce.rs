use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Quiet period before a burst of edits turns into one preview request.
pub const DEFAULT_WAIT: Duration = Duration::from_millis(300);

/// Trailing-edge debounce backed by a tokio timer.
///
/// Each `call` drops whatever was pending and re-arms the timer, so only the
/// last call of a burst runs, `wait` after it was made.
pub struct Debouncer {
    wait: Duration,
    rt: Handle,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(rt: Handle, wait: Duration) -> Self {
        Self {
            wait,
            rt,
            pending: None,
        }
    }

    pub fn call<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let wait = self.wait;
        self.pending = Some(self.rt.spawn(async move {
            tokio::time::sleep(wait).await;
            f();
        }));
    }

    /// Drop the pending call, if any, without running it.
    pub fn cancel(&mut self) {
        if let Some(prev) = self.pending.take() {
            prev.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn FnOnce() + Send>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let make = move |value: &'static str| {
            let sink = sink.clone();
            Box::new(move || sink.lock().unwrap().push(value)) as Box<dyn FnOnce() + Send>
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_last_call() {
        let (fired, make) = recorder();
        let mut d = Debouncer::new(Handle::current(), DEFAULT_WAIT);

        d.call(make("h"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        d.call(make("ht"));
        tokio::time::sleep(Duration::from_millis(299)).await;
        d.call(make("https://example.com/watch?v=abc123"));
        assert!(fired.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(301)).await;
        assert_eq!(
            *fired.lock().unwrap(),
            vec!["https://example.com/watch?v=abc123"]
        );
        assert!(!d.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_fires_before_the_window_closes() {
        let (fired, make) = recorder();
        let mut d = Debouncer::new(Handle::current(), DEFAULT_WAIT);

        d.call(make("a"));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(fired.lock().unwrap().is_empty());
        assert!(d.is_pending());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*fired.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn separated_calls_each_fire() {
        let (fired, make) = recorder();
        let mut d = Debouncer::new(Handle::current(), DEFAULT_WAIT);

        d.call(make("first"));
        tokio::time::sleep(Duration::from_millis(400)).await;
        d.call(make("second"));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(*fired.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_pending_call() {
        let (fired, make) = recorder();
        let mut d = Debouncer::new(Handle::current(), DEFAULT_WAIT);
        d.call(make("gone"));
        drop(d);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(fired.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_call() {
        let (fired, make) = recorder();
        let mut d = Debouncer::new(Handle::current(), DEFAULT_WAIT);
        d.call(make("typed"));
        d.cancel();
        assert!(!d.is_pending());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(fired.lock().unwrap().is_empty());

        // still usable afterwards
        d.call(make("again"));
        tokio::time::sleep(Duration::from_millis(301)).await;
        assert_eq!(*fired.lock().unwrap(), vec!["again"]);
    }
}
