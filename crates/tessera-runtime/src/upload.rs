use std::collections::VecDeque;
use std::mem;
use std::sync::{Mutex, PoisonError};

/// Work that must run on the render thread.
pub(crate) type UploadJob = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Inner {
    jobs: VecDeque<UploadJob>,
    closed: bool,
}

/// Hand-off from workers to the render thread. Once closed it refuses new jobs.
#[derive(Default)]
pub(crate) struct UploadQueue {
    inner: Mutex<Inner>,
}

impl UploadQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enqueues all jobs or none of them. The jobs come back when the queue is closed.
    pub(crate) fn push_all(&self, jobs: Vec<UploadJob>) -> Result<(), Vec<UploadJob>> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(jobs);
        }
        inner.jobs.extend(jobs);
        Ok(())
    }

    /// Everything queued right now; jobs pushed while these run wait for the next call.
    pub(crate) fn take_all(&self) -> VecDeque<UploadJob> {
        mem::take(&mut self.lock().jobs)
    }

    pub(crate) fn close(&self) {
        self.lock().closed = true;
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(counter: &Arc<AtomicUsize>) -> UploadJob {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn take_all_is_a_snapshot() {
        let q = Arc::new(UploadQueue::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let requeue = {
            let q = q.clone();
            let hits = hits.clone();
            Box::new(move || {
                let _ = q.push_all(vec![counting(&hits)]);
            }) as UploadJob
        };
        assert!(q.push_all(vec![counting(&hits), requeue]).is_ok());
        for job in q.take_all() {
            job();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn closed_queue_returns_jobs() {
        let q = UploadQueue::new();
        let hits = Arc::new(AtomicUsize::new(0));
        q.close();
        let rejected = q.push_all(vec![counting(&hits), counting(&hits)]);
        assert_eq!(rejected.map_err(|jobs| jobs.len()), Err(2));
        assert!(q.is_empty());
    }
}
