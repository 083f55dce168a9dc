//! Listener registries with snapshot-before-invoke semantics.
//!
//! Hooks are stored as `Rc<F>` so a caller can copy the current registrant
//! list out of the owning structure, release the borrow, and then invoke each
//! hook with mutable access to the scheduler. Listeners added or removed while
//! a snapshot is being invoked only affect the next invocation.

use std::fmt;
use std::rc::Rc;

/// Handle returned by [`Listeners::add`], used to detach a listener later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Ordered observer list.
pub struct Listeners<F: ?Sized> {
    next: u64,
    entries: Vec<(ListenerId, Rc<F>)>,
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self {
            next: 0,
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> Listeners<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener. Listeners are invoked in insertion order.
    pub fn add(&mut self, listener: Rc<F>) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        self.entries.push((id, listener));
        id
    }

    /// Detach a listener. Returns false if it was not attached.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Copy of the current registrant list, safe to iterate while the owner
    /// is mutated.
    pub fn snapshot(&self) -> Vec<Rc<F>> {
        self.entries
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<F: ?Sized> fmt::Debug for Listeners<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Callback = dyn Fn(&mut Registry);

    #[derive(Default)]
    struct Registry {
        listeners: Listeners<Callback>,
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Registry {
        fn invoke(&mut self) {
            for listener in self.listeners.snapshot() {
                listener(self);
            }
        }
    }

    #[test]
    fn invokes_in_insertion_order() {
        let mut registry = Registry::default();
        let calls = registry.calls.clone();
        let first = calls.clone();
        registry
            .listeners
            .add(Rc::new(move |_: &mut Registry| first.borrow_mut().push("a")));
        let second = calls.clone();
        registry
            .listeners
            .add(Rc::new(move |_: &mut Registry| second.borrow_mut().push("b")));

        registry.invoke();
        assert_eq!(*calls.borrow(), vec!["a", "b"]);
    }

    /// A listener that adds another listener mid-invocation must not see it
    /// fire until the next invocation.
    #[test]
    fn additions_during_invoke_apply_next_time() {
        let mut registry = Registry::default();
        let calls = registry.calls.clone();
        registry.listeners.add(Rc::new(|registry: &mut Registry| {
            registry.calls.borrow_mut().push("outer");
            let calls = registry.calls.clone();
            registry
                .listeners
                .add(Rc::new(move |_: &mut Registry| calls.borrow_mut().push("late")));
        }));

        registry.invoke();
        assert_eq!(*calls.borrow(), vec!["outer"]);

        registry.invoke();
        assert_eq!(*calls.borrow(), vec!["outer", "outer", "late"]);
    }

    /// Removing a later listener mid-invocation still lets the snapshot run it.
    #[test]
    fn removals_during_invoke_apply_next_time() {
        let mut registry = Registry::default();
        let calls = registry.calls.clone();
        let victim_slot: Rc<RefCell<Option<ListenerId>>> = Rc::new(RefCell::new(None));
        let slot = victim_slot.clone();
        registry.listeners.add(Rc::new(move |registry: &mut Registry| {
            registry.calls.borrow_mut().push("remover");
            if let Some(id) = *slot.borrow() {
                registry.listeners.remove(id);
            }
        }));
        let victim_calls = calls.clone();
        let victim = registry
            .listeners
            .add(Rc::new(move |_: &mut Registry| victim_calls.borrow_mut().push("victim")));
        *victim_slot.borrow_mut() = Some(victim);

        registry.invoke();
        registry.invoke();
        assert_eq!(*calls.borrow(), vec!["remover", "victim", "remover"]);
        assert_eq!(registry.listeners.len(), 1);
    }

    #[test]
    fn remove_unknown_returns_false() {
        let mut listeners: Listeners<dyn Fn()> = Listeners::new();
        let id = listeners.add(Rc::new(|| {}));
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        assert!(listeners.is_empty());
    }
}
