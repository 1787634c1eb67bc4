/*
 * Back-references from native window handles to the dialog instances that own
 * them. Native callbacks only carry the handle, so the window procedure looks the
 * instance up here. Entries are inserted on the create message and removed on the
 * destroy notification, after which lookups for that handle miss.
 */

use std::collections::HashMap;

#[derive(Debug)]
pub(crate) struct HandleTable<T> {
    entries: HashMap<isize, T>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Clone> HandleTable<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns `false` (and keeps the existing entry) if `handle` is already registered.
    pub(crate) fn register(&mut self, handle: isize, instance: T) -> bool {
        if self.entries.contains_key(&handle) {
            log::warn!("HandleTable: handle {handle:#x} registered twice; keeping first entry.");
            return false;
        }
        self.entries.insert(handle, instance);
        true
    }

    pub(crate) fn lookup(&self, handle: isize) -> Option<T> {
        self.entries.get(&handle).cloned()
    }

    pub(crate) fn release(&mut self, handle: isize) -> Option<T> {
        self.entries.remove(&handle)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn register_lookup_release() {
        let mut table = HandleTable::new();
        let instance = Rc::new("dialog");
        assert!(table.register(0x1234, Rc::clone(&instance)));
        assert_eq!(table.lookup(0x1234).as_deref(), Some(&"dialog"));
        assert_eq!(Rc::strong_count(&instance), 2);

        assert!(table.release(0x1234).is_some());
        assert!(table.lookup(0x1234).is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn double_registration_keeps_first() {
        let mut table = HandleTable::new();
        assert!(table.register(7, 1));
        assert!(!table.register(7, 2));
        assert_eq!(table.lookup(7), Some(1));
    }

    #[test]
    fn releasing_unknown_handle_is_harmless() {
        let mut table: HandleTable<u8> = HandleTable::new();
        assert!(table.release(99).is_none());
    }
}
