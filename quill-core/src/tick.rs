use std::collections::VecDeque;

/// Callbacks waiting for the next tick boundary, run in the order they were queued.
pub struct TickQueue<T> {
    pending: VecDeque<Box<dyn FnOnce(&T)>>,
}

impl<T> Default for TickQueue<T> {
    fn default() -> Self {
        TickQueue {
            pending: VecDeque::new(),
        }
    }
}

impl<T> TickQueue<T> {
    pub fn defer(&mut self, f: impl FnOnce(&T) + 'static) {
        self.pending.push_back(Box::new(f));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Takes everything queued so far. Callbacks queued while these run wait for the
    /// following tick.
    pub fn take(&mut self) -> VecDeque<Box<dyn FnOnce(&T)>> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn runs_in_order_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut q = TickQueue::<u32>::default();
        for i in 0..3 {
            let seen = seen.clone();
            q.defer(move |base| seen.borrow_mut().push(base + i));
        }
        assert_eq!(q.len(), 3);
        for f in q.take() {
            f(&10);
        }
        assert!(q.is_empty());
        assert_eq!(*seen.borrow(), [10, 11, 12]);
    }
}
