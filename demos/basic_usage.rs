use threads_orchestra::{ShutdownMode, ThreadPoolManager};
use std::thread;
use std::time::Duration;
use tracing::info;

fn my_task_fn(id: usize, delay_ms: u64) {
  info!("Task {} starting, will sleep for {}ms", id, delay_ms);
  thread::sleep(Duration::from_millis(delay_ms));
  info!("Task {} finished successfully after {}ms", id, delay_ms);
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false) // Disable module paths for cleaner example output
    .init();

  info!("--- Basic Usage Example ---");

  let manager = ThreadPoolManager::new(2, "basic_pool");

  for i in 0..5 {
    // Alternate sleep times for variety
    let sleep_duration: u64 = 100 + (i as u64 % 3 * 50);
    match manager.submit(Box::new(move || my_task_fn(i, sleep_duration))) {
      Ok(task_id) => info!("Submitted task {} with id {}", i, task_id),
      Err(e) => tracing::error!("Failed to submit task {}: {:?}", i, e),
    }
  }

  info!(
    "All tasks submitted. Pending: {}, live workers: {}",
    manager.pending_task_count(),
    manager.live_worker_count()
  );

  info!("Shutting down pool (drain).");
  manager.shutdown(ShutdownMode::Drain);
  info!("Pool shutdown complete.");
  info!("--- Basic Usage Example End ---");
}
