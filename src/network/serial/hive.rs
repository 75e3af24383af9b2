//! Event-processing context for the wireless link
//!
//! A [`Hive`] wraps a single-threaded tokio runtime. Connect, accept,
//! receive and send work is spawned into it, but nothing runs until the
//! hive is pumped: each [`Hive::poll`] drives every pending event for one
//! poll interval. A [`Pump`] owns the thread that keeps polling until told
//! to stop.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::TransportError;

/// Pumped event loop
pub struct Hive {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    poll_interval: Duration,
}

impl Hive {
    /// Create a hive that drives events for `poll_interval` per poll
    pub fn new(poll_interval: Duration) -> Result<Arc<Self>, TransportError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TransportError::Spawn(e.to_string()))?;

        Ok(Arc::new(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            poll_interval,
        }))
    }

    /// Queue work; it makes progress only while the hive is polled
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // A stopped hive cancels the task immediately
        drop(self.handle.spawn(future));
    }

    /// Run `future` to completion on the calling thread, pumping all other
    /// queued events meanwhile. Returns `None` once the hive is stopped.
    pub fn block_on<F: Future>(&self, future: F) -> Option<F::Output> {
        let runtime = self.runtime.lock();
        runtime.as_ref().map(|rt| rt.block_on(future))
    }

    /// Pump events for one poll interval. Returns `false` once stopped.
    pub fn poll(&self) -> bool {
        let interval = self.poll_interval;
        self.block_on(tokio::time::sleep(interval)).is_some()
    }

    /// Tear down the context. Pending tasks are dropped, which closes every
    /// stream they own; no event is delivered afterwards.
    pub fn stop(&self) {
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_timeout(Duration::from_millis(100));
        }
    }

    /// Check if the hive has been stopped
    pub fn is_stopped(&self) -> bool {
        self.runtime.lock().is_none()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Drop for Hive {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background thread that keeps a hive pumped:
/// poll once, check the run flag, poll again.
pub struct Pump {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Pump {
    pub fn start(hive: Arc<Hive>, name: String) -> Result<Self, TransportError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || {
                while flag.load(Ordering::Acquire) {
                    if !hive.poll() {
                        break;
                    }
                }
            })
            .map_err(|e| TransportError::Spawn(e.to_string()))?;

        Ok(Self {
            running,
            thread: Some(thread),
        })
    }

    /// Check if the pump thread is still polling
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Flip the run flag and join. Bounded by one poll interval.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Hive pump thread panicked");
            }
        }
    }
}

impl Drop for Pump {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_spawned_work_waits_for_poll() {
        let hive = Hive::new(Duration::from_millis(5)).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        hive.spawn(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert!(hive.poll());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pump_drives_hive_until_stopped() {
        let hive = Hive::new(Duration::from_millis(2)).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        hive.spawn(async move {
            loop {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });

        let mut pump = Pump::start(hive.clone(), "test-pump".into()).unwrap();
        thread::sleep(Duration::from_millis(50));
        pump.stop();
        assert!(!pump.is_running());

        let seen = hits.load(Ordering::SeqCst);
        assert!(seen > 0);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(hits.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_stopped_hive_refuses_work() {
        let hive = Hive::new(Duration::from_millis(1)).unwrap();
        hive.stop();

        assert!(hive.is_stopped());
        assert!(!hive.poll());
        assert!(hive.block_on(async { 1 }).is_none());
        hive.spawn(async {});
    }
}
