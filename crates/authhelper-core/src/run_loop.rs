//! Dedicated event loop for interactive work.
//!
//! The browser flow needs a live event loop to receive its redirect, so the
//! work is hosted on a thread of its own running a single-threaded tokio
//! runtime. The work is started once the loop is live and the loop exits when
//! a [`StopHandle`] is signalled.

use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::{Notify, oneshot};
use tokio::task::LocalSet;

use crate::error::HelperError;
use crate::trace::Logger;

/// Name of the thread hosting the loop.
pub const RUN_LOOP_THREAD_NAME: &str = "auth-helper-run-loop";

/// Thread-safe signal that ends the loop.
///
/// Signalling before the loop starts waiting is not lost.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.notify.notify_one();
    }

    async fn stopped(&self) {
        self.notify.notified().await;
    }
}

/// Stops the loop when dropped, so work that panics still ends the loop.
struct StopOnDrop(StopHandle);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// A running loop.
pub struct RunHandle {
    stop: StopHandle,
    thread: JoinHandle<()>,
}

impl RunHandle {
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Signal the loop to stop and wait for its thread to exit.
    pub fn stop(self) -> Result<(), HelperError> {
        self.stop.stop();
        self.wait()
    }

    /// Wait until something signals stop.
    pub fn wait(self) -> Result<(), HelperError> {
        self.thread
            .join()
            .map_err(|_| HelperError::run_loop("run loop thread panicked"))
    }
}

pub struct AppRunLoop;

impl AppRunLoop {
    /// Start the loop and invoke `on_ready` on it once it is live.
    ///
    /// The future returned by `on_ready` runs on the loop thread and need not
    /// be `Send`. It is dropped if the loop is stopped before it completes.
    pub fn start<F, Fut>(on_ready: F) -> Result<RunHandle, HelperError>
    where
        F: FnOnce(StopHandle) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let stop = StopHandle::default();
        let loop_stop = stop.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), HelperError>>();

        let thread = std::thread::Builder::new()
            .name(RUN_LOOP_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(HelperError::run_loop(format!(
                            "failed to build event loop: {e}"
                        ))));
                        return;
                    }
                };

                let local = LocalSet::new();
                let _ = ready_tx.send(Ok(()));
                local.block_on(&runtime, async move {
                    tokio::task::spawn_local(on_ready(loop_stop.clone()));
                    loop_stop.stopped().await;
                });
                log::debug!("run loop exited");
            })
            .map_err(|e| HelperError::run_loop(format!("failed to spawn run loop thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(RunHandle { stop, thread }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(HelperError::run_loop("run loop thread exited before starting"))
            }
        }
    }

    /// Run `work` on a fresh loop and return its result.
    ///
    /// The loop stops once `work` completes. Calling the stop handle earlier
    /// abandons the work and yields a [`HelperError::RunLoop`].
    pub fn run_delegate<T, F, Fut>(logger: &Logger, work: F) -> Result<T, HelperError>
    where
        T: Send + 'static,
        F: FnOnce(StopHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, HelperError>> + 'static,
    {
        let (result_tx, mut result_rx) = oneshot::channel();

        logger.log("Starting run loop.");
        let handle = Self::start(move |stop| async move {
            let _guard = StopOnDrop(stop.clone());
            let result = work(stop).await;
            let _ = result_tx.send(result);
        })?;

        handle.wait()?;
        logger.log("Run loop stopped.");

        result_rx
            .try_recv()
            .map_err(|_| HelperError::run_loop("run loop stopped before the work completed"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::MemoryWriter;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_on_ready_runs_on_loop_thread() {
        let (tx, rx) = mpsc::channel();

        let handle = AppRunLoop::start(move |stop| async move {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
            stop.stop();
        })
        .unwrap();

        handle.wait().unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some(RUN_LOOP_THREAD_NAME));
    }

    #[test]
    fn test_stop_from_caller_ends_pending_work() {
        let handle = AppRunLoop::start(|_stop| async {
            std::future::pending::<()>().await;
        })
        .unwrap();

        handle.stop().unwrap();
    }

    #[test]
    fn test_stop_before_wait_is_not_lost() {
        let stop = StopHandle::default();
        stop.stop();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let finished = runtime.block_on(async {
            tokio::time::timeout(Duration::from_secs(1), stop.stopped()).await
        });
        assert!(finished.is_ok());
    }

    #[test]
    fn test_loop_serves_timers_and_local_tasks() {
        let value = AppRunLoop::run_delegate(&Logger::new(), |_stop| async {
            let counter = std::rc::Rc::new(std::cell::Cell::new(0));
            let c = counter.clone();
            tokio::task::spawn_local(async move { c.set(41) }).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(counter.get() + 1)
        })
        .unwrap();

        assert_eq!(value, 42);
    }

    #[test]
    fn test_run_delegate_returns_work_error() {
        let result: Result<(), HelperError> = AppRunLoop::run_delegate(&Logger::new(), |_stop| async {
            Err(HelperError::authentication("oauth2", "access_denied", "User cancelled"))
        });

        let err = result.unwrap_err();
        assert_eq!(err.code(), Some("access_denied"));
    }

    #[test]
    fn test_run_delegate_early_stop_is_run_loop_error() {
        let result: Result<u32, HelperError> = AppRunLoop::run_delegate(&Logger::new(), |stop| async move {
            stop.stop();
            std::future::pending::<()>().await;
            Ok(1)
        });

        assert!(matches!(result, Err(HelperError::RunLoop { .. })));
    }

    #[test]
    fn test_run_delegate_traces_lifecycle() {
        let sink = MemoryWriter::new();
        let mut logger = Logger::new();
        logger.add_writer(sink.clone());

        AppRunLoop::run_delegate(&logger, |_stop| async { Ok(()) }).unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Starting run loop."));
        assert!(lines[1].ends_with("Run loop stopped."));
    }
}
