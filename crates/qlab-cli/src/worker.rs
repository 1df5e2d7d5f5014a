//! Long-running work on a background thread.
//!
//! The worker reports progress events over one channel and hands its final
//! result back over another; the calling thread only drains them.

use std::{sync::mpsc, thread};

/// Runs `work` on a spawned thread, calling `on_progress` on this thread for
/// every event it sends, and returns its result.
pub fn run_with_progress<T, P, W, F>(work: W, mut on_progress: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    P: Send + 'static,
    W: FnOnce(&mpsc::Sender<P>) -> T + Send + 'static,
    F: FnMut(P),
{
    let (progress_tx, progress_rx) = mpsc::channel();
    let (result_tx, result_rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let result = work(&progress_tx);
        // receiver is gone only if the main thread already bailed out
        let _ = result_tx.send(result);
    });

    for event in progress_rx {
        on_progress(event);
    }
    let result = result_rx
        .recv()
        .map_err(|_| anyhow::anyhow!("Worker thread stopped without a result"))?;
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("Worker thread panicked"))?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_events_in_order_then_the_result() {
        let mut events = vec![];
        let sum = run_with_progress(
            |tx: &mpsc::Sender<u32>| {
                let mut sum = 0;
                for i in 1..=4 {
                    sum += i;
                    tx.send(i).unwrap();
                }
                sum
            },
            |event| events.push(event),
        )
        .unwrap();
        assert_eq!(events, [1, 2, 3, 4]);
        assert_eq!(sum, 10);
    }

    #[test]
    fn panicking_worker_is_an_error() {
        let result = run_with_progress(
            |_: &mpsc::Sender<()>| -> u32 { panic!("boom") },
            |()| {},
        );
        assert!(result.is_err());
    }
}
