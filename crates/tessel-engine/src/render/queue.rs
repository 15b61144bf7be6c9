//! The render thread and its FIFO task queue.
//!
//! One dedicated thread owns the context `C` (the GPU context in production,
//! any plain value in tests). Every other thread reaches it only by sending
//! boxed closures through a [`TaskSender`]. Tasks run strictly in submission
//! order and always run to completion.

use std::thread::{self, JoinHandle};

use anyhow::Context as _;
use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

/// Work executed on the render thread with exclusive access to the context.
pub type Task<C> = Box<dyn FnOnce(&mut C) + Send + 'static>;

enum Message<C> {
    Run(Task<C>),
    Shutdown,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("render thread has stopped")]
    Closed,
}

/// Cloneable producer side of the queue.
pub struct TaskSender<C> {
    tx: Sender<Message<C>>,
}

impl<C> Clone for TaskSender<C> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<C: 'static> TaskSender<C> {
    /// Enqueues `task` without waiting for it.
    pub fn submit(&self, task: impl FnOnce(&mut C) + Send + 'static) -> Result<(), QueueError> {
        self.tx
            .send(Message::Run(Box::new(task)))
            .map_err(|_| QueueError::Closed)
    }

    /// Enqueues `task` and blocks until it has run, returning its result.
    pub fn call<R: Send + 'static>(
        &self,
        task: impl FnOnce(&mut C) -> R + Send + 'static,
    ) -> Result<R, QueueError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.submit(move |ctx| {
            let _ = reply_tx.send(task(ctx));
        })?;
        reply_rx.recv().map_err(|_| QueueError::Closed)
    }

    /// Barrier: returns once every task submitted before it has run.
    pub fn drain(&self) -> Result<(), QueueError> {
        self.call(|_| ())
    }
}

/// Owner of the render thread.
///
/// Dropping it drains the queue and joins the thread.
pub struct RenderQueue<C> {
    sender: TaskSender<C>,
    handle: Option<JoinHandle<()>>,
}

impl<C: 'static> RenderQueue<C> {
    /// Starts the render thread and builds the context on it.
    ///
    /// `init` runs on the new thread, so `C` itself never crosses threads.
    /// Blocks until `init` has finished and returns its error, if any.
    pub fn spawn<F>(name: &str, init: F) -> anyhow::Result<Self>
    where
        F: FnOnce() -> anyhow::Result<C> + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded::<Message<C>>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<anyhow::Result<()>>(1);

        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let mut ctx = match init() {
                    Ok(ctx) => {
                        let _ = ready_tx.send(Ok(()));
                        ctx
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                log::debug!("render thread started");
                run(&rx, &mut ctx);
                log::debug!("render thread stopped");
            })
            .context("failed to spawn render thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                sender: TaskSender { tx },
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e.context("render context initialization failed"))
            }
            Err(_) => {
                let _ = handle.join();
                anyhow::bail!("render thread exited during initialization")
            }
        }
    }

    #[inline]
    pub fn sender(&self) -> &TaskSender<C> {
        &self.sender
    }

    /// Runs every queued task, then stops the thread and drops the context.
    pub fn shutdown(mut self) {
        self.stop();
    }
}

impl<C> RenderQueue<C> {
    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else { return };
        // Shutdown is queued behind everything already submitted.
        let _ = self.sender.tx.send(Message::Shutdown);
        if handle.join().is_err() {
            log::error!("render thread panicked");
        }
    }
}

impl<C> Drop for RenderQueue<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<C>(rx: &Receiver<Message<C>>, ctx: &mut C) {
    while let Ok(msg) = rx.recv() {
        match msg {
            Message::Run(task) => task(ctx),
            Message::Shutdown => break,
        }
    }
}
