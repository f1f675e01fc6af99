use std::fmt;

/// The type of closure that the pool executes.
/// It must be `Send` and `'static`; it runs exactly once on some worker thread.
pub type TaskToRun = Box<dyn FnOnce() + Send + 'static>;

/// Internal representation of a task managed by the pool.
pub(crate) struct ManagedTaskInternal {
  pub(crate) task_id: u64,
  pub(crate) work: TaskToRun,
}

/// A unit consumed by the worker loop.
///
/// The stop signal is a tagged variant rather than a special task value, so
/// the consume loop can match on it explicitly. A `StopSignal` carries no
/// work; its sole effect is to wake one blocked worker and make it exit.
pub(crate) enum QueueItem {
  Task(ManagedTaskInternal),
  StopSignal,
}

impl fmt::Debug for QueueItem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QueueItem::Task(task) => f
        .debug_struct("Task")
        .field("task_id", &task.task_id)
        .finish_non_exhaustive(),
      QueueItem::StopSignal => f.debug_struct("StopSignal").finish(),
    }
  }
}
