//! The serial save/send lane and the process-wide registry of tasks in it.
//!
//! Every save or send, from every composer session in the process, runs on a
//! single background thread in submission order. Tasks are registered under
//! their id until they finish so that a restarted session can find and await
//! one it started before it was torn down.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture, Either, Shared};
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{ComposeError, Result};
use crate::models::MessageId;

pub type SaveTaskId = u64;

type Job = Box<dyn FnOnce() -> Result<MessageId> + Send>;

enum LaneCmd {
    Run {
        id: SaveTaskId,
        job: Job,
        reply: oneshot::Sender<std::result::Result<MessageId, String>>,
    },
}

/// Handle to a submitted save. Cloning shares the same completion.
#[derive(Clone)]
pub struct SaveTask {
    id: SaveTaskId,
    send: bool,
    done: Shared<BoxFuture<'static, std::result::Result<MessageId, String>>>,
}

impl std::fmt::Debug for SaveTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveTask")
            .field("id", &self.id)
            .field("send", &self.send)
            .finish()
    }
}

impl SaveTask {
    pub fn id(&self) -> SaveTaskId {
        self.id
    }

    pub fn is_send(&self) -> bool {
        self.send
    }

    /// The draft id the task persisted.
    pub async fn wait(&self) -> Result<MessageId> {
        self.done.clone().await.map_err(ComposeError::SaveFailed)
    }

    /// Block the calling thread until the task finishes or `cancel` turns
    /// true (or its sender goes away). Only for background threads.
    pub fn wait_blocking(&self, mut cancel: watch::Receiver<bool>) -> Result<MessageId> {
        let done = self.done.clone();
        let cancelled = Box::pin(async move {
            let _ = cancel.wait_for(|c| *c).await;
        });
        match futures::executor::block_on(future::select(done, cancelled)) {
            Either::Left((result, _)) => result.map_err(ComposeError::SaveFailed),
            Either::Right(_) => Err(ComposeError::Interrupted),
        }
    }
}

#[derive(Default)]
struct Registry {
    next_id: SaveTaskId,
    active: HashMap<SaveTaskId, SaveTask>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// SaveQueue: Clone + Send + Sync, one per process
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SaveQueue {
    registry: Arc<Mutex<Registry>>,
    tx: mpsc::UnboundedSender<LaneCmd>,
}

impl SaveQueue {
    /// Spawn the lane thread. It runs until every handle is dropped and the
    /// tasks already queued have finished.
    pub fn start() -> std::result::Result<Self, String> {
        let registry = Arc::new(Mutex::new(Registry::default()));
        let (tx, rx) = mpsc::unbounded_channel();

        let lane_registry = Arc::clone(&registry);
        std::thread::Builder::new()
            .name("compose-save".into())
            .spawn(move || run_loop(lane_registry, rx))
            .map_err(|e| format!("Failed to spawn save lane: {e}"))?;

        Ok(SaveQueue { registry, tx })
    }

    /// Queue `job` behind every task submitted before it.
    pub fn submit<F>(&self, send: bool, job: F) -> Result<SaveTask>
    where
        F: FnOnce() -> Result<MessageId> + Send + 'static,
    {
        // Held across the enqueue so ids reach the lane in order.
        let mut reg = lock(&self.registry);
        reg.next_id += 1;
        let id = reg.next_id;

        let (reply, rx) = oneshot::channel();
        let done = rx
            .map(move |r| r.unwrap_or_else(|_| Err(format!("save task {id} was dropped"))))
            .boxed()
            .shared();
        let task = SaveTask { id, send, done };
        reg.active.insert(id, task.clone());

        if self
            .tx
            .send(LaneCmd::Run {
                id,
                job: Box::new(job),
                reply,
            })
            .is_err()
        {
            reg.active.remove(&id);
            return Err(ComposeError::Lane("save lane is not running".into()));
        }
        log::debug!("Save task {id} queued (send={send})");
        Ok(task)
    }

    /// A task that has not finished yet.
    pub fn find(&self, id: SaveTaskId) -> Option<SaveTask> {
        lock(&self.registry).active.get(&id).cloned()
    }

    pub fn active_count(&self) -> usize {
        lock(&self.registry).active.len()
    }
}

fn run_loop(registry: Arc<Mutex<Registry>>, mut rx: mpsc::UnboundedReceiver<LaneCmd>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            LaneCmd::Run { id, job, reply } => {
                let result = match panic::catch_unwind(AssertUnwindSafe(job)) {
                    Ok(Ok(message_id)) => {
                        log::debug!("Save task {id} stored draft {message_id}");
                        Ok(message_id)
                    }
                    Ok(Err(e)) => {
                        log::error!("Save task {id} failed: {e}");
                        Err(e.to_string())
                    }
                    Err(_) => {
                        log::error!("Save task {id} panicked");
                        Err(format!("save task {id} panicked"))
                    }
                };
                lock(&registry).active.remove(&id);
                let _ = reply.send(result);
            }
        }
    }
    log::debug!("Save lane exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    #[tokio::test]
    async fn tasks_finish_in_submission_order() {
        let queue = SaveQueue::start().unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for i in 0..5u64 {
            let order = Arc::clone(&order);
            tasks.push(
                queue
                    .submit(false, move || {
                        // Earlier tasks take longer.
                        std::thread::sleep(Duration::from_millis((5 - i) * 10));
                        order.lock().unwrap().push(i);
                        Ok(i as MessageId)
                    })
                    .unwrap(),
            );
        }

        assert_eq!(tasks.last().unwrap().wait().await.unwrap(), 4);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        let ids: Vec<_> = tasks.iter().map(SaveTask::id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn finished_tasks_leave_the_registry() {
        let queue = SaveQueue::start().unwrap();
        let (release, gate) = std_mpsc::channel::<()>();
        let task = queue
            .submit(true, move || {
                let _ = gate.recv();
                Ok(7)
            })
            .unwrap();

        assert!(task.is_send());
        assert!(queue.find(task.id()).is_some());
        assert_eq!(queue.active_count(), 1);

        release.send(()).unwrap();
        assert_eq!(task.wait().await.unwrap(), 7);
        assert!(queue.find(task.id()).is_none());
        assert_eq!(queue.active_count(), 0);
    }

    #[tokio::test]
    async fn failures_reach_every_waiter() {
        let queue = SaveQueue::start().unwrap();
        let failing = queue
            .submit(false, || Err(ComposeError::Store("disk full".into())))
            .unwrap();
        let panicking = queue.submit(false, || panic!("boom")).unwrap();
        let after = queue.submit(false, || Ok(3)).unwrap();

        let copy = failing.clone();
        assert!(matches!(failing.wait().await, Err(ComposeError::SaveFailed(_))));
        assert!(matches!(copy.wait().await, Err(ComposeError::SaveFailed(_))));
        assert!(matches!(panicking.wait().await, Err(ComposeError::SaveFailed(_))));
        assert_eq!(after.wait().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn queued_work_outlives_the_handle() {
        let queue = SaveQueue::start().unwrap();
        let task = queue.submit(false, || Ok(11)).unwrap();
        drop(queue);
        assert_eq!(task.wait().await.unwrap(), 11);
    }

    #[test]
    fn blocking_wait_is_interruptible() {
        let queue = SaveQueue::start().unwrap();
        let (release, gate) = std_mpsc::channel::<()>();
        let task = queue
            .submit(false, move || {
                let _ = gate.recv();
                Ok(1)
            })
            .unwrap();

        let (cancel, token) = watch::channel(false);
        let waiter = {
            let task = task.clone();
            std::thread::spawn(move || task.wait_blocking(token))
        };
        cancel.send_replace(true);
        assert!(matches!(waiter.join().unwrap(), Err(ComposeError::Interrupted)));

        release.send(()).unwrap();
        let (_keep, token) = watch::channel(false);
        assert_eq!(task.wait_blocking(token).unwrap(), 1);
    }
}
