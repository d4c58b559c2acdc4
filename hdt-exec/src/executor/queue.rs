use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tokio::sync::oneshot;

/// Process-wide FIFO queues keyed by `name=value` serial-variable strings.
/// Contexts with equal keys run their whole waterfall one at a time; keys
/// never block each other.
#[derive(Default)]
pub(crate) struct SerialQueues {
    inner: Mutex<HashMap<String, VecDeque<Waiter>>>,
}

struct Waiter {
    /// `None` for the queue head (it never waits).
    resume: Option<oneshot::Sender<()>>,
}

impl SerialQueues {
    /// Join the queue for `key`; resolves once this context is at the head.
    pub(crate) async fn acquire(&self, key: &str) {
        let rx = {
            let mut inner = self.inner.lock().expect("queue mutex poisoned");
            let queue = inner.entry(key.to_string()).or_default();
            if queue.is_empty() {
                queue.push_back(Waiter { resume: None });
                None
            } else {
                let (tx, rx) = oneshot::channel();
                queue.push_back(Waiter { resume: Some(tx) });
                Some(rx)
            }
        };
        if let Some(rx) = rx {
            // The head resumes us on release; a dropped sender means the
            // whole queue went away, which only happens at shutdown.
            let _ = rx.await;
        }
    }

    /// Pop self (the head) and wake the next waiter, if any.
    pub(crate) fn release(&self, key: &str) {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        let Some(queue) = inner.get_mut(key) else {
            return;
        };
        queue.pop_front();
        match queue.front_mut().and_then(|w| w.resume.take()) {
            Some(tx) => {
                let _ = tx.send(());
            }
            None => {
                if queue.is_empty() {
                    inner.remove(key);
                }
            }
        }
    }
}
