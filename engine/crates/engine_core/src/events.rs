/// Per-tick queue of typed events. Producers emit during the tick, the
/// owner drains once at the end in emission order.
#[derive(Debug)]
pub struct EventBus<E> {
    queue: Vec<E>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self { queue: Vec::new() }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: E) {
        self.queue.push(event);
    }

    /// Take every pending event, oldest first.
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.queue)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
