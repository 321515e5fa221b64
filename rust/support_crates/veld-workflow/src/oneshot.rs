//! A thread-safe oneshot channel carrying a single value.
//!
//! The channel transmits exactly one value from the sender to the receiver.
//! It is the transport behind [`JoinHandle`](crate::join_handle::JoinHandle):
//! a worker sends the task result, the joining thread blocks on `recv`.
//!
//! The channel moves through three states: pending (nothing sent), ready
//! (value sent, not yet taken), consumed (value taken, or channel closed).
//! Dropping the sender without sending closes the channel, so a receiver
//! never blocks forever on a task that died before producing a result.

use std::sync::{Arc, Condvar, Mutex};

/// Creates a new oneshot channel, returning the sender/receiver pair.
pub fn channel<T>() -> (OneshotSender<T>, OneshotReceiver<T>) {
    let cell = Arc::new(OneshotCell::new());
    (OneshotSender(cell.clone()), OneshotReceiver(cell))
}

/// Creates a receiver that is already resolved with `value`.
///
/// Useful for handles representing work that completed without ever being
/// dispatched to another thread.
pub fn ready<T>(value: T) -> OneshotReceiver<T> {
    OneshotReceiver(Arc::new(OneshotCell::ready(value)))
}

/// The sending half of a oneshot channel.
///
/// Dropping the sender without sending closes the channel and wakes any
/// waiting receiver.
pub struct OneshotSender<T>(Arc<OneshotCell<T>>);

impl<T> OneshotSender<T> {
    /// Sends a value, consuming the sender.
    ///
    /// Returns `Err(value)` if the channel was already closed.
    pub fn send(self, value: T) -> Result<(), T> {
        self.0.set(value)
    }
}

impl<T> Drop for OneshotSender<T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// The receiving half of a oneshot channel.
pub struct OneshotReceiver<T>(Arc<OneshotCell<T>>);

impl<T> OneshotReceiver<T> {
    /// Blocks until a value arrives or the channel is closed.
    ///
    /// Returns `None` if the sender was dropped without sending, or if the
    /// value was already consumed.
    pub fn recv(&self) -> Option<T> {
        self.0.wait()
    }

    /// Returns `true` while no value has been sent and the channel is open.
    pub fn is_pending(&self) -> bool {
        self.0.is_pending()
    }
}

struct OneshotCell<T> {
    value: Mutex<State<T>>,
    condvar: Condvar,
}

impl<T> OneshotCell<T> {
    fn new() -> OneshotCell<T> {
        OneshotCell {
            value: Mutex::new(State::Pending),
            condvar: Condvar::new(),
        }
    }

    fn ready(value: T) -> OneshotCell<T> {
        OneshotCell {
            value: Mutex::new(State::Ready(value)),
            condvar: Condvar::new(),
        }
    }

    fn set(&self, value: T) -> Result<(), T> {
        let res = self.value.lock().unwrap().set(value);
        self.condvar.notify_all();
        res
    }

    fn is_pending(&self) -> bool {
        self.value.lock().unwrap().is_pending()
    }

    fn close(&self) {
        self.value.lock().unwrap().close();
        self.condvar.notify_all();
    }

    fn wait(&self) -> Option<T> {
        let guard = self.value.lock().unwrap();
        self.condvar
            .wait_while(guard, |state| state.is_pending())
            .unwrap()
            .take()
    }
}

enum State<T> {
    /// No value sent yet, sender alive.
    Pending,
    /// Value sent and awaiting consumption.
    Ready(T),
    /// Value consumed, or channel closed without a value.
    Consumed,
}

impl<T> State<T> {
    fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }

    fn set(&mut self, value: T) -> Result<(), T> {
        match self {
            State::Pending => {
                *self = State::Ready(value);
                Ok(())
            }
            State::Ready(_) | State::Consumed => Err(value),
        }
    }

    fn take(&mut self) -> Option<T> {
        match std::mem::replace(self, State::Consumed) {
            State::Ready(value) => Some(value),
            State::Pending | State::Consumed => None,
        }
    }

    fn close(&mut self) {
        if self.is_pending() {
            *self = State::Consumed;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_send_recv() {
        let (tx, rx) = channel::<usize>();
        assert!(rx.is_pending());
        tx.send(7).unwrap();
        assert_eq!(rx.recv(), Some(7));
        assert_eq!(rx.recv(), None);
    }

    #[test]
    fn test_recv_blocks_until_send() {
        let (tx, rx) = channel::<usize>();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            tx.send(1).unwrap();
        });
        assert_eq!(rx.recv(), Some(1));
    }

    #[test]
    fn test_dropped_sender_closes_channel() {
        let (tx, rx) = channel::<usize>();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            drop(tx);
        });
        assert_eq!(rx.recv(), None);
        assert!(!rx.is_pending());
    }

    #[test]
    fn test_ready_receiver() {
        let rx = ready(42);
        assert!(!rx.is_pending());
        assert_eq!(rx.recv(), Some(42));
    }
}
