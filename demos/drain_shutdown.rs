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
  info!("--- Drain Shutdown Example ---");

  let manager = ThreadPoolManager::new(2, "drain_shutdown_pool");

  // Submit 5 tasks, each takes 500ms.
  // With 2 workers: tasks 0, 1 start; tasks 2, 3, 4 are queued.
  for i in 0..5 {
    match manager.submit(Box::new(move || work_task_fn(i, 500))) {
      Ok(task_id) => info!("Submitted task {} (id {})", i, task_id),
      Err(e) => tracing::error!("Failed to submit task {}: {:?}", i, e),
    }
  }

  info!(
    "All 5 tasks submitted. Pending: {}, live workers: {}",
    manager.pending_task_count(),
    manager.live_worker_count()
  );
  thread::sleep(Duration::from_millis(100)); // Let some tasks start

  // Try submitting another task after the stop was requested (should fail).
  manager.request_stop(ShutdownMode::Drain);
  info!("Attempting to submit a task after stop was requested...");
  match manager.submit(Box::new(|| work_task_fn(99, 100))) {
    Ok(_) => tracing::error!("LATE SUBMISSION SUCCEEDED (UNEXPECTED!)"),
    Err(e) => info!("Late submission correctly failed: {:?}", e),
  }

  info!("Waiting for the queue to drain and the workers to exit...");
  manager.shutdown(ShutdownMode::Drain);
  info!("Pool drained: every queued task ran before the workers exited.");

  info!("--- Drain Shutdown Example End ---");
}
