use std::fmt;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex as StdMutex, Once, RwLock};
use std::thread;
use std::time::SystemTime;
use tracing::{debug, error, info, trace, warn};

// --- Public Event Structs for Handlers ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCompletionStatus {
  Success,
  Panicked,
}

#[derive(Debug, Clone)]
pub struct TaskCompletionInfo {
  pub task_id: u64,
  pub pool_name: Arc<String>,
  pub status: TaskCompletionStatus,
  pub completion_time: SystemTime,
}

// --- Internal Message (crate-public) ---
#[derive(Debug)]
pub(crate) struct InternalCompletionMessage {
  pub(crate) task_id: u64,
  pub(crate) pool_name: Arc<String>,
  pub(crate) status: TaskCompletionStatus,
}

// --- CompletionNotifier Struct ---

struct NotifierInternalState {
  internal_rx_for_init: Option<Receiver<InternalCompletionMessage>>,
  pool_name_for_logging: Arc<String>,
  worker_join_handle: Option<thread::JoinHandle<()>>,
}

pub(crate) struct CompletionNotifier {
  handlers: Arc<RwLock<Vec<Arc<dyn Fn(TaskCompletionInfo) + Send + Sync + 'static>>>>,
  init_once: Once,
  internal_state_for_init: StdMutex<NotifierInternalState>,
}

impl fmt::Debug for CompletionNotifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let handler_count = self.handlers.try_read().map_or(0, |guard| guard.len());
    f.debug_struct("CompletionNotifier")
      .field("handler_count", &handler_count)
      .field("initialized", &self.init_once.is_completed())
      .finish()
  }
}

impl fmt::Debug for NotifierInternalState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NotifierInternalState")
      .field("internal_rx_for_init_is_some", &self.internal_rx_for_init.is_some())
      .field("pool_name_for_logging", &self.pool_name_for_logging)
      .field("worker_join_handle_is_some", &self.worker_join_handle.is_some())
      .finish()
  }
}

impl CompletionNotifier {
  pub(crate) fn new(internal_rx: Receiver<InternalCompletionMessage>, pool_name_for_logging: Arc<String>) -> Arc<Self> {
    Arc::new(Self {
      handlers: Arc::new(RwLock::new(Vec::new())),
      init_once: Once::new(),
      internal_state_for_init: StdMutex::new(NotifierInternalState {
        internal_rx_for_init: Some(internal_rx),
        pool_name_for_logging,
        worker_join_handle: None,
      }),
    })
  }

  /// Whether the notification worker has been started. Workers consult this
  /// before sending, so a pool with no handlers never accumulates messages.
  pub(crate) fn is_initialized(&self) -> bool {
    self.init_once.is_completed()
  }

  fn ensure_worker_initialized(&self) {
    self.init_once.call_once(|| {
      let mut state_guard = self.internal_state_for_init.lock().unwrap();
      if let Some(rx_to_use) = state_guard.internal_rx_for_init.take() {
        info!(pool_name = %*state_guard.pool_name_for_logging, "First completion handler added. Initializing notification worker.");

        let worker_handlers = self.handlers.clone();
        let worker_pool_name = state_guard.pool_name_for_logging.clone();

        let worker_jh = thread::Builder::new()
          .name(format!("{}-notifier", state_guard.pool_name_for_logging))
          .spawn(move || {
            Self::run_notification_worker_loop(rx_to_use, worker_handlers, worker_pool_name);
          })
          .expect("failed to spawn notification worker thread");
        state_guard.worker_join_handle = Some(worker_jh);
      } else {
        warn!(pool_name = %*state_guard.pool_name_for_logging, "Notifier initialization: RX already taken, worker might have been initialized concurrently (unexpected with Once).");
      }
    });
  }

  pub(crate) fn add_handler(&self, handler: impl Fn(TaskCompletionInfo) + Send + Sync + 'static) {
    self.ensure_worker_initialized();

    let pool_name_for_logging = {
      let state_guard = self.internal_state_for_init.lock().unwrap();
      state_guard.pool_name_for_logging.clone()
    };

    let mut handlers_guard = self.handlers.write().unwrap();
    handlers_guard.push(Arc::new(handler));
    info!(pool_name = %*pool_name_for_logging, "Notifier: Added new completion handler. Total handlers: {}", handlers_guard.len());
  }

  fn run_notification_worker_loop(
    queue_rx: Receiver<InternalCompletionMessage>,
    handlers_list_arc: Arc<RwLock<Vec<Arc<dyn Fn(TaskCompletionInfo) + Send + Sync + 'static>>>>,
    pool_name: Arc<String>,
  ) {
    info!(pool_name = %*pool_name, "Notification worker started. Will process messages until every sender is gone.");

    // recv() returns Err only once the channel is closed AND empty, so
    // messages sent before the last worker exited are still delivered.
    while let Ok(internal_msg_payload) = queue_rx.recv() {
      trace!(
        "Notification worker: processing message for task_id: {}",
        internal_msg_payload.task_id
      );

      let handlers_guard = handlers_list_arc.read().unwrap();
      if handlers_guard.is_empty() {
        trace!(
          task_id = %internal_msg_payload.task_id,
          "No completion handlers registered, dropping notification."
        );
        continue;
      }

      let public_info = TaskCompletionInfo {
        task_id: internal_msg_payload.task_id,
        pool_name: internal_msg_payload.pool_name.clone(),
        status: internal_msg_payload.status,
        completion_time: SystemTime::now(),
      };

      debug!(
        task_id = %public_info.task_id,
        "Dispatching notification to {} handlers.",
        handlers_guard.len()
      );

      for handler_arc in handlers_guard.iter() {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
          handler_arc(public_info.clone());
        }));
        if result.is_err() {
          error!(
            "A completion handler panicked during execution. Pool: {}, Task ID: {}",
            public_info.pool_name, public_info.task_id
          );
        }
      }
    }

    info!(pool_name = %*pool_name, "Notification worker stopped (input queue fully closed and processed).");
  }

  /// Joins the notification worker, if one was ever started. Called after
  /// the pool workers have been joined, so the channel is already closed.
  pub(crate) fn join_notification_worker(&self) {
    let (handle_option, pool_name) = {
      let mut guard = self.internal_state_for_init.lock().unwrap();
      let handle = guard.worker_join_handle.take();
      let name = guard.pool_name_for_logging.clone();
      (handle, name)
    };

    if let Some(handle) = handle_option {
      info!(pool_name = %*pool_name, "Notifier: Waiting for notification worker to join.");
      if handle.join().is_err() {
        error!(pool_name = %*pool_name, "Notifier: Notification worker panicked.");
      } else {
        debug!(pool_name = %*pool_name, "Notifier: Notification worker successfully joined.");
      }
    } else {
      trace!(pool_name = %*pool_name, "Notifier: Worker was not initialized or handle already taken; no join needed.");
    }
  }
}
