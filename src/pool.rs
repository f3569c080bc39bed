/// Scoped worker pool for CPU-bound per-item work.
///
/// Workers pull item indices from a bounded channel and send `(index,
/// result)` pairs back; results are reassembled in input order. Nothing is
/// returned until every item has been processed.
use std::collections::BTreeMap;
use std::thread;

use crossbeam_channel::bounded;
use tracing::debug;

/// Apply `f` to every item on up to `workers` threads, preserving order.
pub fn parallel_map<T, R, F>(items: &[T], workers: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = workers.clamp(1, items.len().max(1));
    if workers == 1 {
        return items.iter().map(&f).collect();
    }

    let (task_tx, task_rx) = bounded::<usize>(workers * 2);
    let (result_tx, result_rx) = bounded::<(usize, R)>(workers * 2);
    let f = &f;

    thread::scope(|scope| {
        for worker_id in 0..workers {
            let rx = task_rx.clone();
            let tx = result_tx.clone();
            scope.spawn(move || {
                let mut processed = 0usize;
                for idx in rx.iter() {
                    if tx.send((idx, f(&items[idx]))).is_err() {
                        break;
                    }
                    processed += 1;
                }
                debug!("worker {worker_id} processed {processed} item(s)");
            });
        }
        drop(task_rx);
        drop(result_tx);

        let mut ready = BTreeMap::new();
        let mut next = 0usize;
        // Feed tasks while draining results so neither channel fills up
        while next < items.len() {
            crossbeam_channel::select! {
                send(task_tx, next) -> res => {
                    if res.is_err() {
                        break;
                    }
                    next += 1;
                }
                recv(result_rx) -> msg => {
                    if let Ok((idx, r)) = msg {
                        ready.insert(idx, r);
                    }
                }
            }
        }
        drop(task_tx);

        for (idx, r) in result_rx.iter() {
            ready.insert(idx, r);
        }
        ready.into_values().collect()
    })
}
