//! Bounded worker pool for running one wave of steps.

use std::sync::{mpsc, Mutex};
use std::thread;

/// Run `job` over `items` on at most `workers` scoped threads.
///
/// Workers pull items from a shared queue and send results back over a
/// channel, so results arrive in completion order. `job` must not panic;
/// a panicking job aborts the whole call.
pub(crate) fn run_bounded<T, R, F>(items: Vec<T>, workers: usize, job: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let total = items.len();
    let workers = workers.max(1).min(total);
    if workers == 0 {
        return Vec::new();
    }

    let queue = Mutex::new(items.into_iter());
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        let queue = &queue;
        let job = &job;

        for _ in 0..workers {
            let tx = tx.clone();
            scope.spawn(move || loop {
                let next = queue.lock().ok().and_then(|mut items| items.next());
                let Some(item) = next else {
                    break;
                };
                if tx.send(job(item)).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        rx.iter().take(total).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn processes_every_item() {
        let mut results = run_bounded((1..=10).collect(), 3, |n: u32| n * 2);
        results.sort();
        assert_eq!(results, (1..=10u32).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn empty_input_spawns_nothing() {
        let results: Vec<u32> = run_bounded(Vec::<u32>::new(), 4, |n| n);
        assert!(results.is_empty());
    }

    #[test]
    fn never_exceeds_worker_limit() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        run_bounded((0..8).collect::<Vec<u32>>(), 2, |_| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            running.fetch_sub(1, Ordering::SeqCst);
        });

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn zero_workers_means_one() {
        let results = run_bounded(vec![1, 2, 3], 0, |n: u32| n);
        assert_eq!(results.len(), 3);
    }
}
