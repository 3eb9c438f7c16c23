use std::collections::VecDeque;

/// FIFO of host events awaiting the next frame.
///
/// Host callbacks (geocoder results, button clicks, pointer input) push here
/// instead of mutating visualization state directly; the frame loop drains the
/// queue at a well-defined point so no handler runs re-entrantly.
#[derive(Debug)]
pub struct EventQueue<T> {
    events: VecDeque<T>,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }

    pub fn push(&mut self, event: T) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<T> {
        self.events.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::EventQueue;

    #[test]
    fn drains_in_push_order() {
        let mut q = EventQueue::new();
        q.push("select");
        q.push("toggle");
        assert_eq!(q.len(), 2);
        assert_eq!(q.drain(), vec!["select", "toggle"]);
        assert!(q.is_empty());
    }
}
