use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use anyhow::anyhow;
use bootdag::errors::{BootdagError, Result};
use bootdag::exec::{ExecutorBackend, Job, JobHandle};
use parking_lot::Mutex;
use tracing::debug;

/// A fake executor that:
/// - counts submitted jobs
/// - runs every accepted job on its own short-lived thread
/// - optionally rejects every submission.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    submitted: AtomicUsize,
    reject: bool,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl FakeExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every `submit` fails.
    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            ..Self::default()
        })
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Join every thread spawned so far.
    pub fn join_all(&self) {
        let handles = std::mem::take(&mut *self.threads.lock());
        for h in handles {
            let _ = h.join();
        }
    }
}

impl ExecutorBackend for FakeExecutor {
    fn submit(&self, job: Job) -> Result<JobHandle> {
        let n = self.submitted.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject {
            return Err(BootdagError::Other(anyhow!("fake executor rejects job #{n}")));
        }

        let handle = job.handle();
        let spawned = thread::Builder::new()
            .name(format!("fake-exec-{n}"))
            .spawn(move || job.execute())?;
        debug!(job = n, "fake executor spawned job");
        self.threads.lock().push(spawned);
        Ok(handle)
    }
}
