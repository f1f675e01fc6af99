use threads_orchestra::{ShutdownMode, TaskCompletionInfo, ThreadPoolManager};
use std::thread;
use std::time::Duration;
use tracing::info;

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Task Panic Example ---");

  let manager = ThreadPoolManager::new(1, "panic_pool");

  manager.add_completion_handler(|info: TaskCompletionInfo| {
    info!(
      "Completion handler: task {} on pool '{}' finished with status {:?}",
      info.task_id, info.pool_name, info.status
    );
  });

  let panic_task_id = manager
    .submit(Box::new(|| {
      info!("Panicking Task: Starting...");
      thread::sleep(Duration::from_millis(100));
      info!("Panicking Task: About to panic!");
      panic!("This task is designed to panic!");
    }))
    .expect("Failed to submit panicking task");
  info!("Panicking task {} submitted.", panic_task_id);

  // The worker survives the panic and keeps consuming.
  let follow_up_id = manager
    .submit(Box::new(|| {
      info!("Follow-up task: the worker is still alive.");
    }))
    .expect("Failed to submit follow-up task");
  info!("Follow-up task {} submitted.", follow_up_id);

  info!("Shutting down pool.");
  manager.shutdown(ShutdownMode::Drain);
  info!("Pool shutdown complete.");
  info!("--- Task Panic Example End ---");
}
