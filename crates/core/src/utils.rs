//! Small shared helpers.

use std::time::Duration;

use tokio::sync::watch;

use crate::errors::{Error, Result};

/// Sleeps for `duration`, aborting with [`Error::Interrupted`] if the
/// shutdown channel flips to `true` first. Without a shutdown channel this
/// is a plain sleep.
pub(crate) async fn sleep_interruptible(
    duration: Duration,
    shutdown: Option<&watch::Receiver<bool>>,
) -> Result<()> {
    let Some(rx) = shutdown else {
        tokio::time::sleep(duration).await;
        return Ok(());
    };
    let mut rx = rx.clone();
    if *rx.borrow() {
        return Err(Error::Interrupted);
    }
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return Ok(()),
            changed = rx.changed() => match changed {
                Ok(()) if *rx.borrow() => return Err(Error::Interrupted),
                Ok(()) => continue,
                Err(_) => {
                    // Sender dropped without signalling; finish the sleep.
                    sleep.as_mut().await;
                    return Ok(());
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleeps_to_completion_without_channel() {
        sleep_interruptible(Duration::from_secs(5), None)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn interrupts_when_shutdown_signalled() {
        let (tx, rx) = watch::channel(false);
        let sleeper =
            tokio::spawn(
                async move { sleep_interruptible(Duration::from_secs(60), Some(&rx)).await },
            );
        tx.send(true).unwrap();
        let result = sleeper.await.unwrap();
        assert!(matches!(result, Err(Error::Interrupted)));
    }

    #[tokio::test(start_paused = true)]
    async fn completes_when_sender_dropped_without_signal() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        sleep_interruptible(Duration::from_millis(100), Some(&rx))
            .await
            .unwrap();
    }
}
