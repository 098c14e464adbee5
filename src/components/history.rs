use eframe::egui;
use std::cell::Cell;
use std::rc::Rc;

use crate::actions::Action;
use crate::ops::Mat;

// ============================================================================
// HISTORY ENTRY
// ============================================================================

/// One confirmed edit: the action and the image it produced.
#[derive(Debug)]
pub struct HistoryEntry {
    action: Action,
    image: Mat,
}

impl HistoryEntry {
    pub fn new(action: Action, image: Mat) -> Self {
        Self { action, image }
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn image(&self) -> &Mat {
        &self.image
    }

    pub fn description(&self) -> String {
        self.action.describe()
    }

    pub fn memory_size(&self) -> usize {
        self.image.as_raw().len()
    }
}

// ============================================================================
// HISTORY STORE - ordered, truncatable record with change notification
// ============================================================================

/// Handle returned by [`HistoryStore::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObserverId(u64);

/// Entries in application order. Identity is the `Rc` allocation, so two
/// entries with equal contents are still distinct.
///
/// Storage is oldest-first; "truncate after" keeps a prefix, which makes the
/// chosen entry the newest one and leaves everything older in place.
pub struct HistoryStore<T = HistoryEntry> {
    entries: Vec<Rc<T>>,
    observers: Vec<(ObserverId, Box<dyn FnMut()>)>,
    next_observer: u64,
}

impl<T> Default for HistoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HistoryStore<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// Add `entry` as the newest. Observers are notified before this returns.
    pub fn append(&mut self, entry: impl Into<Rc<T>>) -> Rc<T> {
        let entry = entry.into();
        self.entries.push(Rc::clone(&entry));
        self.notify();
        entry
    }

    /// All entries, most recently appended first.
    pub fn list_newest_first(&self) -> Vec<Rc<T>> {
        self.entries.iter().rev().cloned().collect()
    }

    /// Drop every entry appended after `entry`, making it the newest.
    ///
    /// Unknown entries and an empty store are no-ops. Returns whether the
    /// store changed; observers hear about it only in that case.
    pub fn truncate_after(&mut self, entry: &Rc<T>) -> bool {
        let Some(pos) = self.entries.iter().rposition(|e| Rc::ptr_eq(e, entry)) else {
            return false;
        };
        if pos + 1 == self.entries.len() {
            return false;
        }
        self.entries.truncate(pos + 1);
        self.notify();
        true
    }

    pub fn contains(&self, entry: &Rc<T>) -> bool {
        self.entries.iter().any(|e| Rc::ptr_eq(e, entry))
    }

    pub fn newest(&self) -> Option<&Rc<T>> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove everything, e.g. when the session closes.
    pub fn clear(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        self.entries.clear();
        self.notify();
    }

    pub fn subscribe(&mut self, observer: impl FnMut() + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    fn notify(&mut self) {
        for (_, observer) in self.observers.iter_mut() {
            observer();
        }
    }
}

impl HistoryStore<HistoryEntry> {
    /// Total bytes held by entry images.
    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(|e| e.memory_size()).sum()
    }
}

// ============================================================================
// HISTORY PANEL - UI for displaying history
// ============================================================================

/// What the user asked for in the history panel this frame.
pub enum HistoryPanelAction {
    /// Show this entry's image without touching history.
    Select(Rc<HistoryEntry>),
    /// Discard everything newer than this entry.
    RevertTo(Rc<HistoryEntry>),
}

#[derive(Default)]
pub struct HistoryPanel {
    show_memory_info: bool,
    /// Cached `list_newest_first()`, refreshed after a change notification.
    items: Vec<Rc<HistoryEntry>>,
    stale: Rc<Cell<bool>>,
    subscription: Option<ObserverId>,
}

impl HistoryPanel {
    /// Start listening to `history`; replaces any previous subscription.
    pub fn attach(&mut self, history: &mut HistoryStore) {
        let stale = Rc::clone(&self.stale);
        self.subscription = Some(history.subscribe(move || stale.set(true)));
        self.items = history.list_newest_first();
        self.stale.set(false);
    }

    /// `current` is the entry whose image is on the canvas; it gets the marker.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        history: &HistoryStore,
        current: &Rc<HistoryEntry>,
    ) -> Option<HistoryPanelAction> {
        if self.stale.replace(false) || self.subscription.is_none() {
            self.items = history.list_newest_first();
        }
        let current_idx = current_row(&self.items, current);

        ui.horizontal(|ui| {
            ui.label(format!("Entries: {}", self.items.len()));
            if ui.small_button("ℹ").on_hover_text("Show memory info").clicked() {
                self.show_memory_info = !self.show_memory_info;
            }
        });

        if self.show_memory_info {
            let mem_mb = history.memory_usage() as f64 / (1024.0 * 1024.0);
            ui.label(format!("Memory: {:.2} MB", mem_mb));
        }

        let mut action = None;
        let scroll_width = ui.available_width();
        egui::ScrollArea::vertical()
            .min_scrolled_width(scroll_width)
            .show(ui, |ui| {
                ui.set_min_width(scroll_width);
                if self.items.is_empty() {
                    ui.weak("No history yet");
                    return;
                }
                for (i, entry) in self.items.iter().enumerate() {
                    let is_current = current_idx == Some(i);
                    let is_newest = i == 0;
                    let desc = entry.description();
                    let text = if is_current {
                        egui::RichText::new(format!("▶ {}", desc)).strong().size(11.0)
                    } else {
                        egui::RichText::new(format!("  {}", desc)).size(11.0)
                    };

                    ui.horizontal(|ui| {
                        let label = ui.selectable_label(is_current, text);
                        if label.clicked() && !is_current {
                            action = Some(HistoryPanelAction::Select(Rc::clone(entry)));
                        }
                        if !is_newest
                            && ui
                                .small_button("↺")
                                .on_hover_text("Revert to this state")
                                .clicked()
                        {
                            action = Some(HistoryPanelAction::RevertTo(Rc::clone(entry)));
                        }
                    });
                }
            });
        action
    }
}

/// Row of `current` in a newest-first listing.
fn current_row<T>(items: &[Rc<T>], current: &Rc<T>) -> Option<usize> {
    items.iter().position(|e| Rc::ptr_eq(e, current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn values(store: &HistoryStore<i32>) -> Vec<i32> {
        store.list_newest_first().iter().map(|e| **e).collect()
    }

    fn counting(store: &mut HistoryStore<i32>) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        store.subscribe(move || c.set(c.get() + 1));
        count
    }

    #[test]
    fn truncate_on_empty_store_is_a_no_op() {
        let mut store = HistoryStore::<i32>::new();
        let notified = counting(&mut store);
        assert!(!store.truncate_after(&Rc::new(1)));
        assert!(values(&store).is_empty());
        assert_eq!(notified.get(), 0);
    }

    #[test]
    fn truncate_on_single_entry_keeps_it() {
        let mut store = HistoryStore::<i32>::new();
        let only = store.append(1);
        assert!(!store.truncate_after(&only));
        assert_eq!(values(&store), vec![1]);
    }

    #[test]
    fn truncate_promotes_target_to_newest() {
        let mut store = HistoryStore::<i32>::new();
        let mut handles = Vec::new();
        for v in [5, 4, 3, 2, 1] {
            handles.push(store.append(v));
        }
        let three = Rc::clone(&handles[2]);
        assert!(store.truncate_after(&three));
        assert_eq!(values(&store), vec![3, 4, 5]);
        assert!(Rc::ptr_eq(store.newest().unwrap(), &three));
    }

    #[test]
    fn truncate_uses_identity_not_equality() {
        let mut store = HistoryStore::<i32>::new();
        store.append(7);
        store.append(7);
        let notified = counting(&mut store);
        assert!(!store.truncate_after(&Rc::new(7)));
        assert_eq!(store.len(), 2);
        assert_eq!(notified.get(), 0);
    }

    #[test]
    fn truncate_twice_is_idempotent() {
        let mut store = HistoryStore::<i32>::new();
        let first = store.append(1);
        store.append(2);
        store.append(3);
        let notified = counting(&mut store);
        assert!(store.truncate_after(&first));
        assert!(!store.truncate_after(&first));
        assert_eq!(values(&store), vec![1]);
        assert_eq!(notified.get(), 1);
    }

    #[test]
    fn each_observer_hears_each_mutation_once() {
        let mut store = HistoryStore::<i32>::new();
        let a = counting(&mut store);
        let b = counting(&mut store);
        let first = store.append(1);
        store.append(2);
        store.truncate_after(&first);
        assert_eq!((a.get(), b.get()), (3, 3));
    }

    #[test]
    fn unsubscribed_observer_is_silent() {
        let mut store = HistoryStore::<i32>::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let id = store.subscribe(move || c.set(c.get() + 1));
        store.append(1);
        assert!(store.unsubscribe(id));
        store.append(2);
        assert_eq!(count.get(), 1);
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn notification_fires_before_append_returns() {
        let mut store = HistoryStore::<i32>::new();
        let count = counting(&mut store);
        store.append(1);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn clear_notifies_only_when_non_empty() {
        let mut store = HistoryStore::<i32>::new();
        let count = counting(&mut store);
        store.clear();
        assert_eq!(count.get(), 0);
        store.append(1);
        store.clear();
        assert_eq!(count.get(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn memory_usage_sums_image_bytes() {
        let mut store = HistoryStore::<HistoryEntry>::new();
        store.append(HistoryEntry::new(Action::image_loaded("a.png"), Mat::new(4, 2)));
        store.append(HistoryEntry::new(Action::image_loaded("b.png"), Mat::new(1, 1)));
        assert_eq!(store.memory_usage(), 4 * 2 * 3 + 3);
    }

    #[test]
    fn current_marker_follows_the_selected_entry() {
        let mut store = HistoryStore::<i32>::new();
        let load = store.append(0);
        let first = store.append(1);
        store.append(2);
        let items = store.list_newest_first();
        assert_eq!(current_row(&items, &load), Some(2));
        assert_eq!(current_row(&items, &first), Some(1));
        assert_eq!(current_row(&items, &Rc::new(1)), None);
    }

    proptest! {
        #[test]
        fn listing_is_reverse_insertion_order(items in proptest::collection::vec(any::<i32>(), 0..64)) {
            let mut store = HistoryStore::<i32>::new();
            for v in &items {
                store.append(*v);
            }
            let mut expected = items.clone();
            expected.reverse();
            prop_assert_eq!(values(&store), expected);
        }

        #[test]
        fn truncate_keeps_exactly_the_prefix(len in 1usize..32, cut in 0usize..32) {
            let cut = cut % len;
            let mut store = HistoryStore::<i32>::new();
            let handles: Vec<_> = (0..len as i32).map(|v| store.append(v)).collect();
            store.truncate_after(&handles[cut]);
            let expected: Vec<i32> = (0..=cut as i32).rev().collect();
            prop_assert_eq!(values(&store), expected);
        }
    }
}
