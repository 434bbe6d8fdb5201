//! Latest-wins handoff between the detector thread and the render loop.
//!
//! The mailbox holds at most one message. Posting into a full mailbox evicts
//! the unread message, so a slow consumer always sees the newest detection and
//! never a backlog.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The other side of the mailbox is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed;

/// Create a connected mailbox pair
#[must_use]
pub fn mailbox<T>() -> (MailboxSender<T>, MailboxReceiver<T>) {
    let (tx, rx) = bounded(1);
    let open = Arc::new(AtomicBool::new(true));
    (
        MailboxSender {
            tx,
            evict: rx.clone(),
            open: Arc::clone(&open),
        },
        MailboxReceiver { rx, open },
    )
}

/// Producer half, owned by the detector worker
pub struct MailboxSender<T> {
    tx: Sender<T>,
    evict: Receiver<T>,
    open: Arc<AtomicBool>,
}

impl<T> MailboxSender<T> {
    /// Post a message, replacing any unread one.
    ///
    /// Returns `Ok(true)` if an unread message was evicted.
    ///
    /// # Errors
    ///
    /// Returns [`Closed`] once the receiver has been dropped.
    pub fn post(&self, mut message: T) -> Result<bool, Closed> {
        let mut evicted = false;
        loop {
            if !self.open.load(Ordering::Acquire) {
                return Err(Closed);
            }
            match self.tx.try_send(message) {
                Ok(()) => return Ok(evicted),
                Err(TrySendError::Full(returned)) => {
                    evicted |= self.evict.try_recv().is_ok();
                    message = returned;
                }
                Err(TrySendError::Disconnected(_)) => return Err(Closed),
            }
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.open.load(Ordering::Acquire)
    }
}

/// Consumer half, owned by the render loop
pub struct MailboxReceiver<T> {
    rx: Receiver<T>,
    open: Arc<AtomicBool>,
}

impl<T> MailboxReceiver<T> {
    /// Take the newest message without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`Closed`] when the sender is gone and nothing is left to read.
    pub fn take_latest(&self) -> Result<Option<T>, Closed> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(message) => latest = Some(message),
                Err(TryRecvError::Empty) => return Ok(latest),
                Err(TryRecvError::Disconnected) => {
                    return if latest.is_some() { Ok(latest) } else { Err(Closed) };
                }
            }
        }
    }

    /// Wait up to `timeout` for a message.
    ///
    /// # Errors
    ///
    /// Returns [`Closed`] when the sender is gone and nothing is left to read.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>, Closed> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Closed),
        }
    }
}

impl<T> Drop for MailboxReceiver<T> {
    fn drop(&mut self) {
        self.open.store(false, Ordering::Release);
    }
}

/// Cooperative stop flag shared between an activity and its owner
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop; safe to call any number of times
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear a previous stop so the activity can run again; every clone sees it
    pub fn rearm(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_wins() {
        let (tx, rx) = mailbox();
        assert_eq!(tx.post(1), Ok(false));
        assert_eq!(tx.post(2), Ok(true));
        assert_eq!(tx.post(3), Ok(true));
        assert_eq!(rx.take_latest(), Ok(Some(3)));
        assert_eq!(rx.take_latest(), Ok(None));
    }

    #[test]
    fn test_receiver_drop_closes_sender() {
        let (tx, rx) = mailbox::<u32>();
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.post(1), Err(Closed));
    }

    #[test]
    fn test_sender_drop_drains_then_closes() {
        let (tx, rx) = mailbox();
        tx.post(7).unwrap();
        drop(tx);
        assert_eq!(rx.take_latest(), Ok(Some(7)));
        assert_eq!(rx.take_latest(), Err(Closed));
        assert_eq!(rx.recv_timeout(Duration::from_millis(1)), Err(Closed));
    }

    #[test]
    fn test_posts_across_threads() {
        let (tx, rx) = mailbox();
        let producer = std::thread::spawn(move || {
            for i in 0..1000 {
                tx.post(i).unwrap();
            }
        });
        producer.join().unwrap();
        assert_eq!(rx.take_latest(), Ok(Some(999)));
    }

    #[test]
    fn test_stop_signal_is_shared_and_idempotent() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_stopped());
        signal.stop();
        signal.stop();
        assert!(clone.is_stopped());

        clone.rearm();
        assert!(!signal.is_stopped());
    }
}
