use crate::task::QueueItem;

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// An unbounded, thread-safe FIFO shared by all submitters and all workers.
///
/// Insertion order is preserved. Concurrent dequeuers each receive a distinct
/// item; nothing is dropped except through an explicit [`clear`](Self::clear).
#[derive(Debug)]
pub(crate) struct TaskQueue {
  items: Mutex<VecDeque<QueueItem>>,
  available: Condvar,
}

impl TaskQueue {
  pub(crate) fn new() -> Self {
    Self {
      items: Mutex::new(VecDeque::new()),
      available: Condvar::new(),
    }
  }

  /// Inserts an item at the tail and wakes one waiting dequeuer.
  /// Never blocks; the queue is unbounded.
  pub(crate) fn push(&self, item: QueueItem) {
    let mut items = self.items.lock();
    items.push_back(item);
    drop(items);
    self.available.notify_one();
  }

  /// Removes and returns the head item, suspending the calling thread until
  /// one is available. The wait re-checks the non-empty predicate after
  /// every wake, so spurious wakes and competing dequeuers are harmless.
  pub(crate) fn pop_blocking(&self) -> QueueItem {
    let mut items = self.items.lock();
    loop {
      if let Some(item) = items.pop_front() {
        return item;
      }
      self.available.wait(&mut items);
    }
  }

  /// Atomically removes all pending work items and returns how many were
  /// dropped. Stop signals are retained: wiping a queued sentinel could
  /// leave a worker blocked forever and deadlock a drain wait. Items already
  /// dequeued by a worker are unaffected.
  pub(crate) fn clear(&self) -> usize {
    let mut items = self.items.lock();
    let before = items.len();
    items.retain(|item| matches!(item, QueueItem::StopSignal));
    before - items.len()
  }

  /// Number of pending work items, stop signals excluded.
  pub(crate) fn pending_task_count(&self) -> usize {
    self
      .items
      .lock()
      .iter()
      .filter(|item| matches!(item, QueueItem::Task(_)))
      .count()
  }

  /// Total queue length, stop signals included.
  #[allow(dead_code)]
  pub(crate) fn len(&self) -> usize {
    self.items.lock().len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::task::ManagedTaskInternal;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use std::thread;
  use std::time::Duration;

  fn dummy_task(id: u64) -> QueueItem {
    QueueItem::Task(ManagedTaskInternal {
      task_id: id,
      work: Box::new(|| {}),
    })
  }

  fn task_id_of(item: QueueItem) -> u64 {
    match item {
      QueueItem::Task(task) => task.task_id,
      QueueItem::StopSignal => panic!("expected a work item, got a stop signal"),
    }
  }

  #[test]
  fn test_push_pop_preserves_fifo_order() {
    let queue = TaskQueue::new();
    queue.push(dummy_task(1));
    queue.push(dummy_task(2));
    queue.push(dummy_task(3));

    assert_eq!(task_id_of(queue.pop_blocking()), 1);
    assert_eq!(task_id_of(queue.pop_blocking()), 2);
    assert_eq!(task_id_of(queue.pop_blocking()), 3);
    assert_eq!(queue.len(), 0);
  }

  #[test]
  fn test_pop_blocking_waits_for_push() {
    let queue = Arc::new(TaskQueue::new());

    let consumer = {
      let queue = queue.clone();
      thread::spawn(move || task_id_of(queue.pop_blocking()))
    };

    // Give the consumer time to block on the empty queue.
    thread::sleep(Duration::from_millis(50));
    queue.push(dummy_task(7));

    assert_eq!(consumer.join().unwrap(), 7);
  }

  #[test]
  fn test_clear_drops_tasks_but_keeps_stop_signals() {
    let queue = TaskQueue::new();
    queue.push(dummy_task(1));
    queue.push(QueueItem::StopSignal);
    queue.push(dummy_task(2));
    queue.push(QueueItem::StopSignal);

    assert_eq!(queue.pending_task_count(), 2);
    assert_eq!(queue.clear(), 2);
    assert_eq!(queue.pending_task_count(), 0);
    assert_eq!(queue.len(), 2);

    assert!(matches!(queue.pop_blocking(), QueueItem::StopSignal));
    assert!(matches!(queue.pop_blocking(), QueueItem::StopSignal));
  }

  #[test]
  fn test_concurrent_consumers_receive_distinct_items() {
    let queue = Arc::new(TaskQueue::new());
    let num_items: usize = 100;
    let num_consumers = 4;
    let received = Arc::new(AtomicUsize::new(0));

    let consumers: Vec<_> = (0..num_consumers)
      .map(|_| {
        let queue = queue.clone();
        let received = received.clone();
        thread::spawn(move || loop {
          match queue.pop_blocking() {
            QueueItem::Task(_) => {
              received.fetch_add(1, Ordering::SeqCst);
            }
            QueueItem::StopSignal => break,
          }
        })
      })
      .collect();

    for i in 0..num_items {
      queue.push(dummy_task(i as u64));
    }
    for _ in 0..num_consumers {
      queue.push(QueueItem::StopSignal);
    }

    for consumer in consumers {
      consumer.join().unwrap();
    }

    assert_eq!(received.load(Ordering::SeqCst), num_items);
    assert_eq!(queue.len(), 0);
  }

  #[test]
  fn test_concurrent_clear_leaves_queue_consistent() {
    let queue = Arc::new(TaskQueue::new());
    let num_producers = 4;
    let items_per_producer: usize = 200;

    let producers: Vec<_> = (0..num_producers)
      .map(|p| {
        let queue = queue.clone();
        thread::spawn(move || {
          for i in 0..items_per_producer {
            queue.push(dummy_task((p * items_per_producer + i) as u64));
          }
        })
      })
      .collect();

    let clearer = {
      let queue = queue.clone();
      thread::spawn(move || {
        let mut dropped = 0;
        for _ in 0..10 {
          dropped += queue.clear();
          thread::sleep(Duration::from_millis(1));
        }
        dropped
      })
    };

    for producer in producers {
      producer.join().unwrap();
    }
    let dropped = clearer.join().unwrap();
    let remaining = queue.clear();

    // Every pushed item was either cleared or is still queued; none were
    // duplicated or lost mid-clear.
    assert_eq!(dropped + remaining, num_producers * items_per_producer);
  }
}
