use threads_orchestra::{ShutdownMode, ThreadPoolManager};
use std::thread;
use std::time::Duration;
use tracing::info;

fn work_task_fn(id: usize, duration_ms: u64) {
  info!("Task {} starting (will run for {}ms)", id, duration_ms);
  thread::sleep(Duration::from_millis(duration_ms));
  info!("Task {} finished after {}ms", id, duration_ms);
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Discard Shutdown Example ---");

  let manager = ThreadPoolManager::new(2, "discard_shutdown_pool");

  // Two long tasks occupy both workers; the rest never leave the queue.
  for i in 0..2 {
    manager
      .submit(Box::new(move || work_task_fn(i, 1000)))
      .expect("Failed to submit long task");
  }
  thread::sleep(Duration::from_millis(100)); // Let the long tasks start

  for i in 2..7 {
    manager
      .submit(Box::new(move || work_task_fn(i, 100)))
      .expect("Failed to submit queued task");
  }
  info!("Pending tasks before discard stop: {}", manager.pending_task_count());

  info!("Shutting down with Discard: queued tasks are dropped, in-flight tasks finish.");
  manager.shutdown(ShutdownMode::Discard);
  info!("Pool stopped. Only tasks 0 and 1 ever ran.");

  info!("--- Discard Shutdown Example End ---");
}
