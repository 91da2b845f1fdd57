//! Periodic task scheduler.
//!
//! A timer thread keeps armed tasks in a min-heap keyed by their next fire
//! time. Each task owns a worker thread; when a task comes due the timer
//! signals its worker, the worker runs the action and reports back, and only
//! then is the task re-armed at `completion + interval`.
//!
//! A task is out of the heap while it runs, so it can never overlap itself.
//! Different tasks run on different workers and overlap freely with each other
//! and with whatever the caller does in the foreground. Cadence drifts by the
//! action's duration; that is not corrected.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

pub type TaskId = usize;

/// A named action re-run every `interval` after its previous run returned.
pub struct PeriodicTask {
    name: String,
    interval: Duration,
    action: Box<dyn FnMut() + Send>,
}

impl PeriodicTask {
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        action: impl FnMut() + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            interval,
            action: Box::new(action),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting in the heap.
    Armed { due: Instant },
    /// Action in flight on the worker.
    Running,
    /// Will not fire again.
    Cancelled,
}

/// Point-in-time view of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub id: TaskId,
    pub name: String,
    pub interval: Duration,
    pub state: TaskState,
    /// Number of times the action was started.
    pub runs: u64,
}

enum Message {
    Completed { id: TaskId, finished_at: Instant },
    Cancel { id: TaskId, reply: Sender<bool> },
    Inspect { reply: Sender<Vec<TaskStatus>> },
    Shutdown,
}

/// Collects tasks before they start.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<PeriodicTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: PeriodicTask) -> TaskId {
        self.tasks.push(task);
        self.tasks.len() - 1
    }

    /// Spawn the workers and the timer. Every task fires once right away.
    pub fn start(self) -> Result<SchedulerHandle> {
        let (tx, rx) = mpsc::channel();
        let mut slots = Vec::with_capacity(self.tasks.len());
        let mut workers = Vec::with_capacity(self.tasks.len());

        for (id, task) in self.tasks.into_iter().enumerate() {
            let PeriodicTask {
                name,
                interval,
                mut action,
            } = task;
            let (fire_tx, fire_rx) = mpsc::channel::<()>();
            let done_tx = tx.clone();
            let worker_name = name.clone();
            let worker = thread::Builder::new()
                .name(format!("task-{name}"))
                .spawn(move || {
                    for () in fire_rx {
                        if panic::catch_unwind(AssertUnwindSafe(&mut action)).is_err() {
                            error!(task = %worker_name, "task action panicked");
                        }
                        let done = Message::Completed {
                            id,
                            finished_at: Instant::now(),
                        };
                        if done_tx.send(done).is_err() {
                            break;
                        }
                    }
                })
                .with_context(|| format!("spawn worker for task {name}"))?;
            info!(task = %name, interval_secs = interval.as_secs_f64(), "task scheduled");
            slots.push(Slot {
                name,
                interval,
                state: TaskState::Running,
                runs: 0,
                fire: Some(fire_tx),
            });
            workers.push(worker);
        }

        let timer = thread::Builder::new()
            .name("scheduler".to_string())
            .spawn(move || {
                let mut timer = Timer {
                    slots,
                    heap: BinaryHeap::new(),
                    seq: 0,
                };
                let now = Instant::now();
                for id in 0..timer.slots.len() {
                    timer.arm(id, now);
                }
                timer.run(&rx);
                // Dropping the fire senders ends every worker loop once its
                // in-flight action returns.
                drop(timer);
                for worker in workers {
                    if worker.join().is_err() {
                        error!("task worker panicked");
                    }
                }
            })
            .context("spawn scheduler timer")?;

        Ok(SchedulerHandle {
            tx,
            timer: Some(timer),
        })
    }
}

struct Slot {
    name: String,
    interval: Duration,
    state: TaskState,
    runs: u64,
    fire: Option<Sender<()>>,
}

struct Timer {
    slots: Vec<Slot>,
    heap: BinaryHeap<Reverse<(Instant, u64, TaskId)>>,
    seq: u64,
}

impl Timer {
    fn arm(&mut self, id: TaskId, due: Instant) {
        self.slots[id].state = TaskState::Armed { due };
        self.heap.push(Reverse((due, self.seq, id)));
        self.seq += 1;
    }

    fn run(&mut self, rx: &Receiver<Message>) {
        loop {
            self.fire_due(Instant::now());

            let message = match self.heap.peek() {
                Some(Reverse((due, _, _))) => {
                    rx.recv_timeout(due.saturating_duration_since(Instant::now()))
                }
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match message {
                Ok(Message::Completed { id, finished_at }) => self.complete(id, finished_at),
                Ok(Message::Cancel { id, reply }) => {
                    let _ = reply.send(self.cancel(id));
                }
                Ok(Message::Inspect { reply }) => {
                    let _ = reply.send(self.statuses());
                }
                Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    debug!("scheduler stopping");
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    fn fire_due(&mut self, now: Instant) {
        while let Some(Reverse((due, _, id))) = self.heap.peek().copied() {
            if due > now {
                break;
            }
            self.heap.pop();
            let slot = &mut self.slots[id];
            // Entries of cancelled tasks stay in the heap until they surface.
            if slot.state != (TaskState::Armed { due }) {
                continue;
            }
            let Some(fire) = &slot.fire else {
                continue;
            };
            if fire.send(()).is_err() {
                warn!(task = %slot.name, "task worker gone, cancelling");
                slot.state = TaskState::Cancelled;
                slot.fire = None;
                continue;
            }
            slot.state = TaskState::Running;
            slot.runs += 1;
        }
    }

    fn complete(&mut self, id: TaskId, finished_at: Instant) {
        let Some(slot) = self.slots.get(id) else {
            return;
        };
        if slot.state != TaskState::Running {
            return;
        }
        let due = finished_at + slot.interval;
        debug!(task = %slot.name, runs = slot.runs, "task re-armed");
        self.arm(id, due);
    }

    fn cancel(&mut self, id: TaskId) -> bool {
        match self.slots.get_mut(id) {
            Some(slot) if slot.state != TaskState::Cancelled => {
                info!(task = %slot.name, "task cancelled");
                slot.state = TaskState::Cancelled;
                slot.fire = None;
                true
            }
            _ => false,
        }
    }

    fn statuses(&self) -> Vec<TaskStatus> {
        self.slots
            .iter()
            .enumerate()
            .map(|(id, slot)| TaskStatus {
                id,
                name: slot.name.clone(),
                interval: slot.interval,
                state: slot.state,
                runs: slot.runs,
            })
            .collect()
    }
}

/// Control surface of a running scheduler.
///
/// Dropping the handle stops the timer without waiting for in-flight actions;
/// [`SchedulerHandle::shutdown`] waits for them.
pub struct SchedulerHandle {
    tx: Sender<Message>,
    timer: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Current state of every task, ordered by id.
    pub fn tasks(&self) -> Vec<TaskStatus> {
        let (reply, answer) = mpsc::channel();
        if self.tx.send(Message::Inspect { reply }).is_err() {
            return Vec::new();
        }
        answer.recv().unwrap_or_default()
    }

    /// Stop re-arming a task. A run already in flight is allowed to finish.
    ///
    /// Returns `false` for unknown or already cancelled tasks.
    pub fn cancel(&self, id: TaskId) -> bool {
        let (reply, answer) = mpsc::channel();
        if self.tx.send(Message::Cancel { id, reply }).is_err() {
            return false;
        }
        answer.recv().unwrap_or(false)
    }

    /// Stop the timer and wait for every worker to go idle.
    pub fn shutdown(mut self) {
        let _ = self.tx.send(Message::Shutdown);
        if let Some(timer) = self.timer.take()
            && timer.join().is_err()
        {
            error!("scheduler timer panicked");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if self.timer.is_some() {
            let _ = self.tx.send(Message::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        check()
    }

    #[test]
    fn fires_immediately_and_again_after_interval() {
        let starts = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&starts);
        let mut scheduler = Scheduler::new();
        scheduler.add(PeriodicTask::new("tick", Duration::from_millis(40), move || {
            recorded.lock().expect("lock").push(Instant::now());
        }));

        let begin = Instant::now();
        let handle = scheduler.start().expect("start");
        assert!(wait_until(Duration::from_secs(2), || {
            starts.lock().expect("lock").len() >= 3
        }));
        handle.shutdown();

        let starts = starts.lock().expect("lock").clone();
        assert!(starts[0].duration_since(begin) < Duration::from_millis(500));
        for pair in starts.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(40));
        }
    }

    #[test]
    fn same_task_never_runs_concurrently() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicU64::new(0));
        let (flight, max, count) = (
            Arc::clone(&in_flight),
            Arc::clone(&max_seen),
            Arc::clone(&runs),
        );
        let mut scheduler = Scheduler::new();
        scheduler.add(PeriodicTask::new("busy", Duration::ZERO, move || {
            let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
            max.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(3));
            flight.fetch_sub(1, Ordering::SeqCst);
            count.fetch_add(1, Ordering::SeqCst);
        }));

        let handle = scheduler.start().expect("start");
        assert!(wait_until(Duration::from_secs(2), || {
            runs.load(Ordering::SeqCst) >= 20
        }));
        handle.shutdown();

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn interval_is_measured_from_completion() {
        let starts = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&starts);
        let mut scheduler = Scheduler::new();
        scheduler.add(PeriodicTask::new("slow", Duration::from_millis(20), move || {
            recorded.lock().expect("lock").push(Instant::now());
            thread::sleep(Duration::from_millis(30));
        }));

        let handle = scheduler.start().expect("start");
        assert!(wait_until(Duration::from_secs(2), || {
            starts.lock().expect("lock").len() >= 3
        }));
        handle.shutdown();

        let starts = starts.lock().expect("lock").clone();
        for pair in starts.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(50));
        }
    }

    #[test]
    fn different_tasks_run_concurrently() {
        let (a_started, a_seen) = mpsc::channel::<()>();
        let (b_started, b_seen) = mpsc::channel::<()>();
        let (results_tx, results) = mpsc::channel::<(&'static str, bool)>();
        let results_b = results_tx.clone();
        let hour = Duration::from_secs(3600);

        let mut scheduler = Scheduler::new();
        scheduler.add(PeriodicTask::new("a", hour, move || {
            let _ = a_started.send(());
            let met = b_seen.recv_timeout(Duration::from_secs(2)).is_ok();
            let _ = results_tx.send(("a", met));
        }));
        scheduler.add(PeriodicTask::new("b", hour, move || {
            let _ = b_started.send(());
            let met = a_seen.recv_timeout(Duration::from_secs(2)).is_ok();
            let _ = results_b.send(("b", met));
        }));

        let handle = scheduler.start().expect("start");
        let mut outcomes = vec![
            results.recv_timeout(Duration::from_secs(5)).expect("first"),
            results.recv_timeout(Duration::from_secs(5)).expect("second"),
        ];
        outcomes.sort();
        handle.shutdown();

        assert_eq!(outcomes, vec![("a", true), ("b", true)]);
    }

    #[test]
    fn cancelled_task_is_not_rearmed() {
        let runs = Arc::new(AtomicU64::new(0));
        let count = Arc::clone(&runs);
        let mut scheduler = Scheduler::new();
        let id = scheduler.add(PeriodicTask::new("tick", Duration::from_millis(5), move || {
            count.fetch_add(1, Ordering::SeqCst);
        }));

        let handle = scheduler.start().expect("start");
        assert!(wait_until(Duration::from_secs(2), || {
            runs.load(Ordering::SeqCst) >= 2
        }));
        assert!(handle.cancel(id));
        let settled = runs.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));

        assert!(runs.load(Ordering::SeqCst) <= settled + 1);
        assert_eq!(handle.tasks()[id].state, TaskState::Cancelled);
        assert!(!handle.cancel(id));
        assert!(!handle.cancel(99));
        handle.shutdown();
    }

    #[test]
    fn inspection_reports_next_fire_time() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.add(PeriodicTask::new("rare", Duration::from_secs(3600), || {}));

        let handle = scheduler.start().expect("start");
        assert!(wait_until(Duration::from_secs(2), || {
            let tasks = handle.tasks();
            tasks[id].runs == 1 && matches!(tasks[id].state, TaskState::Armed { .. })
        }));

        let status = handle.tasks()[id].clone();
        assert_eq!(status.name, "rare");
        assert_eq!(status.interval, Duration::from_secs(3600));
        let TaskState::Armed { due } = status.state else {
            panic!("expected armed task");
        };
        assert!(due > Instant::now() + Duration::from_secs(3500));
        handle.shutdown();
    }

    #[test]
    fn panicking_action_is_rearmed() {
        let runs = Arc::new(AtomicU64::new(0));
        let count = Arc::clone(&runs);
        let mut scheduler = Scheduler::new();
        scheduler.add(PeriodicTask::new("flaky", Duration::from_millis(1), move || {
            if count.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first run fails");
            }
        }));

        let handle = scheduler.start().expect("start");
        assert!(wait_until(Duration::from_secs(2), || {
            runs.load(Ordering::SeqCst) >= 3
        }));
        handle.shutdown();
    }
}
