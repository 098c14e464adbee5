use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::actions::{Action, RawAction};
use crate::components::history::{HistoryEntry, HistoryStore};
use crate::error::{ActionError, IoError};
use crate::io::load_image;
use crate::ops::Mat;
use crate::processor::ActionProcessor;

/// Single open image and everything applied to it.
pub struct Session {
    pub history: HistoryStore,
    processor: ActionProcessor,
    /// Entry whose image the next action is applied to. Usually the newest,
    /// older after `select_entry`.
    current: Rc<HistoryEntry>,
    /// Result of the last `preview`, shown until applied or discarded.
    preview: Option<Mat>,
    /// `None` for images that did not come from a file.
    pub path: Option<PathBuf>,
    /// Display name (file name or the label given at creation).
    pub name: String,
}

impl Session {
    pub fn open(path: &Path) -> Result<Self, IoError> {
        let image = load_image(path)?;
        let mut session = Self::from_image(&path.to_string_lossy(), image);
        session.path = Some(path.to_path_buf());
        session.name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        Ok(session)
    }

    /// Start a session on an in-memory image; `label` names the load entry.
    pub fn from_image(label: &str, image: Mat) -> Self {
        Self::with_processor(label, image, ActionProcessor::new())
    }

    pub fn with_processor(label: &str, image: Mat, processor: ActionProcessor) -> Self {
        let mut history = HistoryStore::new();
        let current = history.append(HistoryEntry::new(Action::image_loaded(label), image));
        Self {
            history,
            processor,
            current,
            preview: None,
            path: None,
            name: label.to_string(),
        }
    }

    pub fn current_image(&self) -> &Mat {
        self.current.image()
    }

    pub fn current_entry(&self) -> &Rc<HistoryEntry> {
        &self.current
    }

    pub fn has_preview(&self) -> bool {
        self.preview.is_some()
    }

    /// Preview if there is one, otherwise the current image.
    pub fn display_image(&self) -> &Mat {
        self.preview.as_ref().unwrap_or(self.current.image())
    }

    /// Run `action` on the current image without committing it.
    pub fn preview(&mut self, action: &Action) -> Result<&Mat, ActionError> {
        let result = self.processor.process(action, self.current.image())?;
        Ok(self.preview.insert(result))
    }

    /// Run `action` on the current image, make the result current and record
    /// it. After a `select_entry` the entries newer than the selected one are
    /// dropped first, so history stays one chain ending at the current image.
    /// On error nothing changes.
    pub fn apply(&mut self, action: Action) -> Result<Rc<HistoryEntry>, ActionError> {
        let result = self.processor.process(&action, self.current.image())?;
        self.preview = None;
        self.history.truncate_after(&self.current);
        self.current = self.history.append(HistoryEntry::new(action, result));
        Ok(Rc::clone(&self.current))
    }

    /// Throw away the pending preview.
    pub fn discard(&mut self) {
        self.preview = None;
    }

    /// Make `entry` current without changing history. The next `apply`
    /// branches from it.
    pub fn select_entry(&mut self, entry: &Rc<HistoryEntry>) -> bool {
        if !self.history.contains(entry) {
            return false;
        }
        self.preview = None;
        self.current = Rc::clone(entry);
        true
    }

    /// Drop every entry newer than `entry` and continue from its image.
    pub fn revert_to(&mut self, entry: &Rc<HistoryEntry>) -> bool {
        if !self.history.contains(entry) {
            return false;
        }
        self.history.truncate_after(entry);
        self.preview = None;
        self.current = Rc::clone(entry);
        true
    }

    /// Actions that produced the current image, oldest first, without the
    /// load entry. Entries newer than a selected one are left out.
    pub fn recipe(&self) -> Vec<RawAction> {
        let mut entries = self.history.list_newest_first();
        entries.reverse();
        let end = entries
            .iter()
            .position(|e| Rc::ptr_eq(e, &self.current))
            .map_or(entries.len(), |i| i + 1);
        entries[..end]
            .iter()
            .filter(|e| !e.action().is_image_loaded())
            .map(|e| e.action().to_raw())
            .collect()
    }

    pub fn display_title(&self) -> String {
        if self.history.len() > 1 {
            format!("{} ({} edits)", self.name, self.history.len() - 1)
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ColorSpace, InRangeParams, MorphParams, MorphShape};
    use image::Rgb;

    fn session() -> Session {
        let img = Mat::from_fn(20, 20, |x, y| {
            if (5..15).contains(&x) && (5..15).contains(&y) {
                Rgb([230, 30, 30])
            } else {
                Rgb([10, 10, 10])
            }
        });
        Session::from_image("test.png", img)
    }

    fn erode(anchor: u32) -> Action {
        Action::Erosion(MorphParams::new(MorphShape::Rect, anchor))
    }

    #[test]
    fn starts_with_a_load_entry() {
        let s = session();
        let entries = s.history.list_newest_first();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].action().is_image_loaded());
        assert_eq!(entries[0].image(), s.current_image());
    }

    #[test]
    fn preview_then_discard_changes_nothing() {
        let mut s = session();
        let before_image = s.current_image().clone();
        let before_entries = s.history.list_newest_first();

        let previewed = s.preview(&erode(2)).unwrap().clone();
        assert_ne!(&previewed, s.current_image());
        assert_eq!(s.display_image(), &previewed);
        s.discard();

        assert_eq!(s.current_image(), &before_image);
        assert_eq!(s.display_image(), &before_image);
        let after_entries = s.history.list_newest_first();
        assert_eq!(after_entries.len(), before_entries.len());
        assert!(after_entries.iter().zip(&before_entries).all(|(a, b)| Rc::ptr_eq(a, b)));
    }

    #[test]
    fn apply_appends_and_advances_current() {
        let mut s = session();
        let entry = s.apply(erode(1)).unwrap();
        assert_eq!(s.history.len(), 2);
        assert!(Rc::ptr_eq(s.history.newest().unwrap(), &entry));
        assert_eq!(entry.image(), s.current_image());
        assert!(!s.has_preview());
    }

    #[test]
    fn failed_apply_leaves_state_untouched() {
        let mut s = session();
        let before = s.current_image().clone();
        let err = s.apply(Action::image_loaded("x.png")).unwrap_err();
        assert!(matches!(err, ActionError::UnsupportedAction(_)));
        assert_eq!(s.history.len(), 1);
        assert_eq!(s.current_image(), &before);
    }

    #[test]
    fn revert_truncates_and_restores_image() {
        let mut s = session();
        let first = s.apply(erode(1)).unwrap();
        s.apply(erode(2)).unwrap();
        s.apply(Action::InRange(InRangeParams {
            color_space: ColorSpace::Hsv,
            lower: [0, 100, 100],
            upper: [10, 255, 255],
        }))
        .unwrap();

        assert!(s.revert_to(&first));
        assert_eq!(s.history.len(), 2);
        assert_eq!(s.current_image(), first.image());
        assert!(Rc::ptr_eq(s.history.newest().unwrap(), &first));
    }

    #[test]
    fn select_keeps_history() {
        let mut s = session();
        let load = s.history.list_newest_first()[0].clone();
        s.apply(erode(1)).unwrap();
        assert!(s.select_entry(&load));
        assert_eq!(s.history.len(), 2);
        assert_eq!(s.current_image(), load.image());
    }

    fn dilate(anchor: u32) -> Action {
        Action::Dilation(MorphParams::new(MorphShape::Rect, anchor))
    }

    fn lit(img: &Mat) -> usize {
        img.pixels().filter(|p| p.0[0] > 0).count()
    }

    fn replay(s: &Session, original: &Mat) -> Mat {
        let processor = ActionProcessor::new();
        s.recipe().iter().fold(original.clone(), |img, raw| {
            processor.process_raw(raw, &img).unwrap()
        })
    }

    #[test]
    fn apply_after_select_branches_from_the_selected_entry() {
        let dot = Mat::from_fn(15, 15, |x, y| {
            if (x, y) == (7, 7) { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        });
        let mut s = Session::from_image("dot.png", dot.clone());
        let load = Rc::clone(s.current_entry());
        let wide = s.apply(dilate(2)).unwrap();
        assert_eq!(lit(wide.image()), 25);

        assert!(s.select_entry(&load));
        let narrow = s.apply(dilate(1)).unwrap();
        assert_eq!(lit(s.current_image()), 9);
        assert_eq!(s.history.len(), 2);
        assert!(!s.history.contains(&wide));
        assert!(Rc::ptr_eq(s.history.newest().unwrap(), &narrow));

        let recipe = s.recipe();
        assert_eq!(recipe.len(), 1);
        assert_eq!(&replay(&s, &dot), s.current_image());
    }

    #[test]
    fn recipe_stops_at_the_selected_entry() {
        let mut s = session();
        let original = s.current_image().clone();
        let first = s.apply(erode(1)).unwrap();
        s.apply(erode(2)).unwrap();
        assert!(s.select_entry(&first));
        assert!(Rc::ptr_eq(s.current_entry(), &first));
        assert_eq!(s.history.len(), 3);
        assert_eq!(s.recipe().len(), 1);
        assert_eq!(&replay(&s, &original), s.current_image());
    }

    #[test]
    fn foreign_entry_is_ignored() {
        let mut s = session();
        s.apply(erode(1)).unwrap();
        let stranger = Rc::new(HistoryEntry::new(erode(1), Mat::new(1, 1)));
        let before = s.current_image().clone();
        assert!(!s.revert_to(&stranger));
        assert!(!s.select_entry(&stranger));
        assert_eq!(s.history.len(), 2);
        assert_eq!(s.current_image(), &before);
    }

    #[test]
    fn recipe_lists_applied_actions_oldest_first() {
        let mut s = session();
        s.apply(erode(1)).unwrap();
        s.apply(erode(3)).unwrap();
        let recipe = s.recipe();
        assert_eq!(recipe.len(), 2);
        assert_eq!(Action::try_from(&recipe[0]).unwrap(), erode(1));
        assert_eq!(Action::try_from(&recipe[1]).unwrap(), erode(3));
    }
}
