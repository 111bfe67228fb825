use std::collections::VecDeque;

/// Single-threaded listener bus with queued dispatch.
///
/// Events emitted while a dispatch is in progress (a listener mutating the
/// owner, which emits again) are appended to the queue and delivered after the
/// current event finishes, so listeners always observe fully committed state
/// in emission order.
pub struct Listeners<E> {
    subscribers: Vec<Box<dyn FnMut(&E)>>,
    queue: VecDeque<E>,
    dispatching: bool,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Listeners {
            subscribers: Vec::new(),
            queue: VecDeque::new(),
            dispatching: false,
        }
    }

    /// Register a callback invoked for every subsequent event.
    pub fn subscribe(&mut self, callback: impl FnMut(&E) + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Emit an event to all subscribers, in subscription order.
    pub fn emit(&mut self, event: E) {
        self.queue.push_back(event);
        if self.dispatching {
            return;
        }
        self.dispatching = true;
        while let Some(event) = self.queue.pop_front() {
            for subscriber in &mut self.subscribers {
                subscriber(&event);
            }
        }
        self.dispatching = false;
    }
}
