//! Background publisher for the current status.
//!
//! A [`StatusPublisher`] owns one worker thread. Callers on any thread record
//! the status they want with [`StatusPublisher::set_status`]; the worker
//! persists whatever is newest whenever it is free. Intermediate statuses set
//! while the worker is busy are skipped. Failed writes are retried forever at
//! a fixed interval, always with the newest status rather than the one that
//! failed.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use status_model::Status;
use tracing::{Span, debug, info, info_span, warn};

use crate::error::{Error, Result};
use crate::sink::{FileSink, StatusSink};

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

const THREAD_NAME: &str = "agent-state-updater";

#[derive(Debug, Clone)]
pub struct PublisherOptions {
    /// Pause after a failed write before the worker looks again.
    pub retry_interval: Duration,
    /// Span every publisher event is recorded in. A span named
    /// `status_publisher` carrying the target is created when absent.
    pub span: Option<Span>,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            span: None,
        }
    }
}

impl PublisherOptions {
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

struct PublisherState {
    desired: Status,
    stop_requested: bool,
}

struct Shared {
    state: Mutex<PublisherState>,
    wake: Condvar,
}

pub struct StatusPublisher {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    exited: Mutex<bool>,
    exit_signal: Condvar,
    span: Span,
}

impl StatusPublisher {
    /// Starts publishing `initial` to `target`, replacing the file on every write.
    pub fn new(initial: Status, target: impl Into<PathBuf>) -> Result<Self> {
        Self::with_options(initial, target, PublisherOptions::default())
    }

    pub fn with_options(
        initial: Status,
        target: impl Into<PathBuf>,
        options: PublisherOptions,
    ) -> Result<Self> {
        Self::with_sink(initial, FileSink::new(target), options)
    }

    /// Starts the worker thread; its first action is to publish `initial`.
    pub fn with_sink<S: StatusSink>(
        initial: Status,
        sink: S,
        options: PublisherOptions,
    ) -> Result<Self> {
        let span = options
            .span
            .unwrap_or_else(|| info_span!("status_publisher", target = %sink.describe()));
        let shared = Arc::new(Shared {
            state: Mutex::new(PublisherState {
                desired: initial,
                stop_requested: false,
            }),
            wake: Condvar::new(),
        });

        let worker = Worker {
            shared: Arc::clone(&shared),
            sink,
            retry_interval: options.retry_interval,
            span: span.clone(),
        };
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(Error::Spawn)?;

        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
            exited: Mutex::new(false),
            exit_signal: Condvar::new(),
            span,
        })
    }

    /// Records `status` as the one to publish and wakes the worker.
    ///
    /// Returns without waiting for any I/O.
    pub fn set_status(&self, status: Status) {
        let _entered = self.span.enter();
        info!(status = %status, "status change requested");
        let mut state = self.shared.state.lock();
        if state.stop_requested {
            debug!(status = %status, "publisher is stopping; change will not be written");
        }
        state.desired = status;
        self.shared.wake.notify_one();
    }

    /// The most recently requested status, written or not.
    pub fn desired(&self) -> Status {
        self.shared.state.lock().desired.clone()
    }

    /// `false` once the worker thread has been joined. Never blocks on I/O.
    pub fn is_running(&self) -> bool {
        !*self.exited.lock()
    }

    /// Asks the worker to flush the newest status and waits for it to exit.
    ///
    /// Blocks for as long as the target stays unwritable. Concurrent and later
    /// calls return once the worker has exited.
    pub fn shutdown(&self) {
        // the join below runs without holding `worker`
        let handle = self.worker.lock().take();
        let Some(handle) = handle else {
            let mut exited = self.exited.lock();
            while !*exited {
                self.exit_signal.wait(&mut exited);
            }
            return;
        };

        let _entered = self.span.enter();
        info!("publisher shutdown requested");
        {
            let mut state = self.shared.state.lock();
            state.stop_requested = true;
            self.shared.wake.notify_one();
        }
        if handle.join().is_err() {
            warn!("status publisher thread panicked");
        }
        *self.exited.lock() = true;
        self.exit_signal.notify_all();
    }
}

impl Drop for StatusPublisher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker<S> {
    shared: Arc<Shared>,
    sink: S,
    retry_interval: Duration,
    span: Span,
}

impl<S: StatusSink> Worker<S> {
    fn run(mut self) {
        let span = self.span.clone();
        let _entered = span.enter();

        let mut last_written: Option<Status> = None;
        while let Some(status) = self.next_pending(last_written.as_ref()) {
            match self.sink.publish(&status) {
                Ok(()) => {
                    info!(status = %status, "status was updated");
                    last_written = Some(status);
                }
                Err(err) => {
                    warn!(
                        status = %status,
                        error = ?err,
                        retry_in = ?self.retry_interval,
                        "failed to update status; will retry"
                    );
                    thread::sleep(self.retry_interval);
                }
            }
        }
        info!("status publisher thread exited");
    }

    /// Blocks until the desired status differs from `last_written`.
    /// `None` once a stop was requested and nothing is left to write.
    fn next_pending(&self, last_written: Option<&Status>) -> Option<Status> {
        let mut state = self.shared.state.lock();
        loop {
            if last_written != Some(&state.desired) {
                return Some(state.desired.clone());
            }
            if state.stop_requested {
                return None;
            }
            self.shared.wake.wait(&mut state);
        }
    }
}
