//! Simulation-thread dispatch.
//!
//! Live-world collaborators are not thread safe and must only be touched from
//! the simulation thread. Async code ships whole closures to that thread and
//! awaits their result. A closure that has been shipped always runs to
//! completion, even if the awaiting future is dropped, so a reconcile pass is
//! never left half applied.
//!
//! Two hosting modes:
//! - [`SimThread::spawn`] owns the context on a dedicated OS thread.
//! - [`SimThread::pumped`] hands back a [`SimPump`] that the host's own tick
//!   loop drains with its context.

use anyhow::{anyhow, Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

type Job<C> = Box<dyn FnOnce(&mut C) + Send + 'static>;

/// Cloneable handle used to run work on the simulation thread.
pub struct SimThread<C> {
    jobs: mpsc::UnboundedSender<Job<C>>,
}

impl<C> Clone for SimThread<C> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}

impl<C: 'static> SimThread<C> {
    /// Move `ctx` onto a dedicated thread named `name`.
    ///
    /// The thread exits once every handle has been dropped.
    pub fn spawn(name: &str, ctx: C) -> Result<Self>
    where
        C: Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<C>>();
        let thread_name = name.to_string();

        std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut ctx = ctx;
                info!(thread = %thread_name, "simulation thread started");
                while let Some(job) = rx.blocking_recv() {
                    job(&mut ctx);
                }
                info!(thread = %thread_name, "simulation thread stopped");
            })
            .with_context(|| format!("failed to spawn simulation thread {name}"))?;

        Ok(Self { jobs: tx })
    }

    /// Handle plus a pump for hosts that drive their own tick loop.
    pub fn pumped() -> (Self, SimPump<C>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { jobs: tx }, SimPump { jobs: rx })
    }

    /// Run `f` against the simulation context and return its result.
    pub async fn run<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut C) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job<C> = Box::new(move |ctx| {
            let out = f(ctx);
            // Receiver may be gone if the caller was cancelled; the work is done regardless.
            let _ = done_tx.send(out);
        });

        self.jobs
            .send(job)
            .map_err(|_| anyhow!("simulation thread has shut down"))?;

        done_rx
            .await
            .context("simulation thread dropped a job before completing it")
    }
}

/// Receiving end of a pumped [`SimThread`].
pub struct SimPump<C> {
    jobs: mpsc::UnboundedReceiver<Job<C>>,
}

impl<C> SimPump<C> {
    /// Run every job queued so far. Returns how many ran.
    pub fn run_pending(&mut self, ctx: &mut C) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.jobs.try_recv() {
            job(ctx);
            ran += 1;
        }
        if ran > 0 {
            debug!(jobs = ran, "simulation pump drained");
        }
        ran
    }

    /// Block the current (non-async) thread until the next job arrives and run it.
    /// Returns `false` once every handle has been dropped.
    pub fn run_next_blocking(&mut self, ctx: &mut C) -> bool {
        match self.jobs.blocking_recv() {
            Some(job) => {
                job(ctx);
                true
            }
            None => false,
        }
    }
}
