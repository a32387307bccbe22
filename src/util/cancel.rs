use std::time::Duration;

use tokio::sync::watch;

/// Cancellable wait used between status checks.
#[derive(Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Cancellation {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleeps for `duration`. Returns `false` if cancelled before the timer fired.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut rx = self.rx.clone();
        if *rx.borrow_and_update() {
            return false;
        }

        let timer = tokio::time::sleep(duration);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => return true,
                changed = rx.changed() => match changed {
                    Ok(()) if *rx.borrow_and_update() => return false,
                    Ok(()) => continue,
                    // handle dropped: nothing can cancel any more
                    Err(_) => {
                        (&mut timer).await;
                        return true;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_cancel() {
        let (_handle, cancel) = cancellation();
        let started = tokio::time::Instant::now();
        assert!(cancel.sleep(Duration::from_secs(10)).await);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_still_waits() {
        let (handle, cancel) = cancellation();
        drop(handle);
        assert!(cancel.sleep(Duration::from_secs(3)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_sleep() {
        let (handle, cancel) = cancellation();
        let waiter = tokio::spawn({
            let cancel = cancel.clone();
            async move { cancel.sleep(Duration::from_secs(60)).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();

        assert!(!waiter.await.unwrap());
        assert!(cancel.is_cancelled());
        assert!(!cancel.sleep(Duration::from_secs(1)).await);
    }
}
