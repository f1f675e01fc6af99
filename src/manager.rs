use crate::error::PoolError;
use crate::notifier::{CompletionNotifier, InternalCompletionMessage, TaskCompletionInfo, TaskCompletionStatus};
use crate::task::{ManagedTaskInternal, QueueItem, TaskToRun};
use crate::task_queue::TaskQueue;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering as AtomicOrdering};
use std::sync::{mpsc, Arc, Mutex as StdMutex};
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, info_span, trace, warn};

lazy_static::lazy_static! {
  static ref NEXT_POOL_TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// Defines what happens to queued tasks when the pool is asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
  /// Lets every already-queued task run to completion before the workers
  /// exit.
  Drain,
  /// Discards queued tasks that no worker has picked up yet.
  /// Tasks already being executed still run to completion.
  Discard,
}

/// Lifecycle of a pool instance. Transitions only move forward; a stopped
/// pool cannot be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
  Running = 0,
  StopRequested = 1,
  Stopped = 2,
}

impl PoolState {
  fn from_u8(value: u8) -> Self {
    match value {
      0 => PoolState::Running,
      1 => PoolState::StopRequested,
      _ => PoolState::Stopped,
    }
  }
}

/// State shared between the manager and its worker threads.
///
/// `state` is read lock-free everywhere, but every store happens while
/// holding `live_workers`. That serializes worker registration against the
/// stop snapshot: a worker either registers before the transition and is
/// covered by a stop signal, or observes the non-`Running` state and never
/// registers at all.
struct PoolShared {
  pool_name: Arc<String>,
  queue: TaskQueue,
  state: AtomicU8,
  live_workers: Mutex<usize>,
  all_exited: Condvar,
}

impl PoolShared {
  fn state(&self) -> PoolState {
    PoolState::from_u8(self.state.load(AtomicOrdering::Acquire))
  }
}

/// A fixed-size pool of worker threads consuming tasks from a shared
/// unbounded FIFO queue.
///
/// The worker count is fixed at construction. Stopping is two-phase:
/// [`request_stop`](Self::request_stop) signals the workers and returns
/// immediately, [`shutdown`](Self::shutdown) additionally blocks until every
/// worker has exited. Dropping the manager without an explicit stop requests
/// a drain stop as a safety net, but callers are expected to call
/// [`shutdown`](Self::shutdown) themselves.
pub struct ThreadPoolManager {
  shared: Arc<PoolShared>,
  notifier: Arc<CompletionNotifier>,
  worker_join_handles: StdMutex<Vec<thread::JoinHandle<()>>>,
}

impl ThreadPoolManager {
  /// Creates a pool and immediately starts `num_workers` worker threads.
  /// A worker count of zero is clamped to one.
  pub fn new(num_workers: usize, pool_name: &str) -> Arc<Self> {
    let num_workers = num_workers.max(1);
    let pool_name = Arc::new(pool_name.to_string());

    let shared = Arc::new(PoolShared {
      pool_name: pool_name.clone(),
      queue: TaskQueue::new(),
      state: AtomicU8::new(PoolState::Running as u8),
      live_workers: Mutex::new(0),
      all_exited: Condvar::new(),
    });

    let (completion_tx, completion_rx) = mpsc::channel::<InternalCompletionMessage>();
    let notifier = CompletionNotifier::new(completion_rx, pool_name.clone());

    let mut worker_join_handles = Vec::with_capacity(num_workers);
    for worker_index in 0..num_workers {
      let worker_shared = shared.clone();
      let worker_notifier = notifier.clone();
      let worker_completion_tx = completion_tx.clone();

      let join_handle = thread::Builder::new()
        .name(format!("{}-worker-{}", pool_name, worker_index))
        .spawn(move || {
          Self::run_worker_loop(worker_index, worker_shared, worker_completion_tx, worker_notifier);
        })
        .expect("failed to spawn pool worker thread");
      worker_join_handles.push(join_handle);
    }
    // The workers hold the only senders now; once they all exit, the
    // notification worker sees a closed channel and stops.
    drop(completion_tx);

    info!(pool_name = %pool_name, num_workers, "Thread pool created, workers starting.");

    Arc::new(Self {
      shared,
      notifier,
      worker_join_handles: StdMutex::new(worker_join_handles),
    })
  }

  pub fn name(&self) -> &str {
    &self.shared.pool_name
  }

  /// Current lifecycle state of the pool.
  pub fn state(&self) -> PoolState {
    self.shared.state()
  }

  pub fn is_running(&self) -> bool {
    self.state() == PoolState::Running
  }

  /// Number of worker threads currently between start and exit.
  pub fn live_worker_count(&self) -> usize {
    *self.shared.live_workers.lock()
  }

  /// Returns the current number of tasks in the pending queue.
  pub fn pending_task_count(&self) -> usize {
    self.shared.queue.pending_task_count()
  }

  /// Submits a task for execution and returns its assigned id.
  ///
  /// # Errors
  /// Returns `PoolError::PoolShuttingDown` once a stop has been requested.
  /// The original design dropped such submissions silently; surfacing the
  /// error makes the lost work observable, and fire-and-forget callers can
  /// simply ignore the result.
  pub fn submit(&self, task: TaskToRun) -> Result<u64, PoolError> {
    if self.state() != PoolState::Running {
      warn!(pool_name = %self.shared.pool_name, "Submit: Attempted to submit task to a pool that is stopping or stopped.");
      return Err(PoolError::PoolShuttingDown);
    }

    let task_id = NEXT_POOL_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    debug!(pool_name = %self.shared.pool_name, %task_id, "Submitting task to queue.");
    self
      .shared
      .queue
      .push(QueueItem::Task(ManagedTaskInternal { task_id, work: task }));
    Ok(task_id)
  }

  /// Removes every task still waiting in the queue and returns how many were
  /// dropped. Safe to call at any time; tasks already picked up by a worker
  /// run to completion.
  pub fn discard_pending(&self) -> usize {
    let dropped = self.shared.queue.clear();
    if dropped > 0 {
      info!(pool_name = %self.shared.pool_name, dropped, "Discarded pending tasks.");
    }
    dropped
  }

  /// Requests that the pool stop, without waiting for the workers to exit.
  ///
  /// Idempotent: only the first call has any effect. The live worker count
  /// is snapshotted in the same critical section as the state transition and
  /// exactly one stop signal per live worker is enqueued, so every blocked
  /// worker wakes exactly once. The pool transitions to `Stopped`
  /// asynchronously as the workers exit.
  pub fn request_stop(&self, mode: ShutdownMode) {
    let live_snapshot = {
      let live_workers = self.shared.live_workers.lock();
      if self.shared.state() != PoolState::Running {
        debug!(pool_name = %self.shared.pool_name, "Stop already requested; ignoring.");
        return;
      }
      self
        .shared
        .state
        .store(PoolState::StopRequested as u8, AtomicOrdering::Release);
      if *live_workers == 0 {
        // No worker ever registered (or all exited early); nothing will
        // flip the state later.
        self
          .shared
          .state
          .store(PoolState::Stopped as u8, AtomicOrdering::Release);
      }
      *live_workers
    };

    info!(
      pool_name = %self.shared.pool_name,
      mode = ?mode,
      live_workers = live_snapshot,
      "Stop requested."
    );

    if mode == ShutdownMode::Discard {
      let dropped = self.shared.queue.clear();
      if dropped > 0 {
        info!(pool_name = %self.shared.pool_name, dropped, "Discarded pending tasks for stop.");
      }
    }

    for _ in 0..live_snapshot {
      self.shared.queue.push(QueueItem::StopSignal);
    }
  }

  /// Stops the pool and blocks until every worker thread has fully exited.
  ///
  /// Equivalent to [`request_stop`](Self::request_stop) followed by an
  /// unbounded wait for the live worker count to reach zero; the worker
  /// threads and the notification worker are then joined. Safe to call more
  /// than once and from multiple threads; later calls simply wait.
  pub fn shutdown(&self, mode: ShutdownMode) {
    self.request_stop(mode);

    {
      let mut live_workers = self.shared.live_workers.lock();
      // Re-check after every wake: wakes can be spurious and there may be
      // several waiters.
      while *live_workers > 0 {
        self.shared.all_exited.wait(&mut live_workers);
      }
    }

    let handles_to_join: Vec<thread::JoinHandle<()>> = {
      let mut guard = self.worker_join_handles.lock().unwrap();
      guard.drain(..).collect()
    };
    for handle in handles_to_join {
      if handle.join().is_err() {
        error!(pool_name = %self.shared.pool_name, "A worker thread panicked outside task execution.");
      }
    }

    self.notifier.join_notification_worker();
    info!(pool_name = %self.shared.pool_name, "Pool shutdown complete.");
  }

  /// Registers a handler invoked with a [`TaskCompletionInfo`] after every
  /// executed task. The first registration lazily starts the notification
  /// worker thread.
  pub fn add_completion_handler(&self, handler: impl Fn(TaskCompletionInfo) + Send + Sync + 'static) {
    self.notifier.add_handler(handler);
  }

  fn run_worker_loop(
    worker_index: usize,
    shared: Arc<PoolShared>,
    completion_tx: mpsc::Sender<InternalCompletionMessage>,
    notifier: Arc<CompletionNotifier>,
  ) {
    let span = info_span!("worker_loop", pool_name = %*shared.pool_name, worker = worker_index);
    let _span_guard = span.entered();

    {
      let mut live_workers = shared.live_workers.lock();
      if shared.state() != PoolState::Running {
        // The pool stopped before this worker got going. It was never
        // counted, so no stop signal is owed to it.
        info!("Pool already stopping at worker start; exiting immediately.");
        return;
      }
      *live_workers += 1;
    }
    info!("Worker started.");

    loop {
      match shared.queue.pop_blocking() {
        QueueItem::StopSignal => {
          // Only enqueued after the state left Running, so no flag needs
          // flipping here.
          debug!("Stop signal received. Worker loop terminating.");
          break;
        }
        QueueItem::Task(managed_task) => {
          let task_id = managed_task.task_id;
          trace!(%task_id, "Dequeued task. Executing.");

          let work = managed_task.work;
          let execution_result = catch_unwind(AssertUnwindSafe(move || work()));

          let status = match execution_result {
            Ok(()) => {
              trace!(%task_id, "Task executed successfully.");
              TaskCompletionStatus::Success
            }
            Err(_panic_payload) => {
              error!(%task_id, "Task panicked during execution.");
              TaskCompletionStatus::Panicked
            }
          };

          if notifier.is_initialized() {
            let message = InternalCompletionMessage {
              task_id,
              pool_name: shared.pool_name.clone(),
              status,
            };
            if completion_tx.send(message).is_err() {
              warn!(%task_id, "Completion notification dropped; notification worker is gone.");
            }
          }
        }
      }
    }

    {
      let mut live_workers = shared.live_workers.lock();
      *live_workers -= 1;
      if *live_workers == 0 {
        shared
          .state
          .store(PoolState::Stopped as u8, AtomicOrdering::Release);
        shared.all_exited.notify_all();
      }
    }
    info!("Worker exited.");
  }
}

impl Drop for ThreadPoolManager {
  fn drop(&mut self) {
    if self.state() == PoolState::Running {
      // Signal only, never block in drop. The workers exit on their own once
      // they reach a stop signal; without this, dropping the manager would
      // leave them parked in the queue forever.
      info!(
        pool_name = %self.shared.pool_name,
        "ThreadPoolManager dropped without explicit shutdown. Requesting drain stop."
      );
      self.request_stop(ShutdownMode::Drain);
    }
  }
}
