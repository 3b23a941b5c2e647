/// Staged image management
///
/// Owns the local files picked for a submission together with their
/// preview handles, and tracks which one is the cover (primary) image.
///
/// Preview handles are RAII values handed out by a `PreviewRegistry`:
/// dropping a handle releases it, so removing an entry, resetting the
/// form, or tearing down the wizard all release exactly once.

use iced::widget::image;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::{DEFAULT_MAX_IMAGES, DEFAULT_MAX_IMAGE_BYTES};

/// A local file picked by the user, not yet uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    /// File name only (e.g. "render_01.png")
    pub name: String,
    /// MIME type guessed from the extension
    pub mime: String,
    pub size: u64,
}

impl StagedFile {
    /// Stage a file from disk, reading its size and guessing its type
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let size = std::fs::metadata(path)?.len();
        Ok(Self::new(path.to_path_buf(), size))
    }

    pub fn new(path: PathBuf, size: u64) -> Self {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let mime = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self { path, name, mime, size }
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime == "application/pdf"
    }

    /// Extension of the original file name, if any
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name).extension().and_then(|e| e.to_str())
    }

    /// Read the whole file for upload
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    live: HashSet<u64>,
    released: u64,
}

/// Hands out preview handles and keeps count of the live ones
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Allocate a preview for a staged file
    pub fn allocate(&self, file: &StagedFile) -> PreviewHandle {
        let id = {
            let mut state = self.state();
            state.next_id += 1;
            let id = state.next_id;
            state.live.insert(id);
            id
        };
        debug!("preview {} allocated for {}", id, file.name);

        PreviewHandle {
            id,
            image: image::Handle::from_path(&file.path),
            registry: self.clone(),
        }
    }

    fn release(&self, id: u64) {
        let mut state = self.state();
        if state.live.remove(&id) {
            state.released += 1;
            debug!("preview {} released ({} so far)", id, state.released);
        } else {
            error!("preview {} released twice", id);
        }
    }

    /// Number of handles allocated and not yet released
    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    /// Number of handles released so far
    #[cfg(test)]
    pub fn released_count(&self) -> u64 {
        self.state().released
    }
}

/// Process-local preview of a staged image; released when dropped
#[derive(Debug)]
pub struct PreviewHandle {
    id: u64,
    image: image::Handle,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn image(&self) -> &image::Handle {
        &self.image
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

#[derive(Debug)]
pub struct ImageEntry {
    pub file: StagedFile,
    pub preview: PreviewHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageLimitError {
    #[error("Maximum {max} images allowed")]
    LimitExceeded { max: usize },
}

/// What happened to a batch passed to `ImageManager::add`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: usize,
    /// Valid images that did not fit in the remaining slots
    pub dropped: usize,
    /// Files that were not images
    pub rejected_type: usize,
    /// Images over the size limit
    pub rejected_size: usize,
    /// Free slots before the batch was applied
    pub remaining_before: usize,
    max_file_mb: u64,
}

impl AddOutcome {
    /// Advisory text for the user, if anything was left out
    pub fn advisory(&self) -> Option<String> {
        if self.dropped > 0 {
            let remaining = self.remaining_before;
            return Some(format!(
                "Only {} more image{} allowed",
                remaining,
                if remaining == 1 { "" } else { "s" }
            ));
        }
        if self.rejected_size > 0 {
            return Some(format!("Each image must be under {} MB", self.max_file_mb));
        }
        if self.rejected_type > 0 {
            return Some("Only image files can be added".to_string());
        }
        None
    }
}

/// The ordered set of staged images plus the cover index
///
/// Invariants:
/// - `entries.len() <= max_images`
/// - if non-empty, `primary < entries.len()`; if empty, `primary == 0`
#[derive(Debug)]
pub struct ImageManager {
    entries: Vec<ImageEntry>,
    primary: usize,
    max_images: usize,
    max_file_bytes: u64,
    registry: PreviewRegistry,
}

impl ImageManager {
    pub fn new(registry: PreviewRegistry) -> Self {
        Self::with_limits(registry, DEFAULT_MAX_IMAGES, DEFAULT_MAX_IMAGE_BYTES)
    }

    pub fn with_limits(registry: PreviewRegistry, max_images: usize, max_file_bytes: u64) -> Self {
        Self {
            entries: Vec::new(),
            primary: 0,
            max_images,
            max_file_bytes,
            registry,
        }
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn primary_index(&self) -> usize {
        self.primary
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    pub fn remaining(&self) -> usize {
        self.max_images.saturating_sub(self.entries.len())
    }

    /// Files in staging order, for a submission snapshot
    pub fn files(&self) -> Vec<StagedFile> {
        self.entries.iter().map(|e| e.file.clone()).collect()
    }

    /// Stage a batch of candidate files
    ///
    /// Non-images and oversized images are filtered out first; the valid
    /// ones then fill the free slots in order and the rest are dropped.
    pub fn add(&mut self, files: Vec<StagedFile>) -> Result<AddOutcome, ImageLimitError> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Err(ImageLimitError::LimitExceeded {
                max: self.max_images,
            });
        }

        let mut outcome = AddOutcome {
            remaining_before: remaining,
            max_file_mb: self.max_file_bytes / (1024 * 1024),
            ..AddOutcome::default()
        };

        for file in files {
            if !file.is_image() {
                outcome.rejected_type += 1;
                continue;
            }
            if file.size > self.max_file_bytes {
                outcome.rejected_size += 1;
                continue;
            }
            if outcome.added == remaining {
                outcome.dropped += 1;
                continue;
            }

            let preview = self.registry.allocate(&file);
            self.entries.push(ImageEntry { file, preview });
            outcome.added += 1;
        }

        debug!(
            "staged {} images ({} dropped, {} not images, {} too large)",
            outcome.added, outcome.dropped, outcome.rejected_type, outcome.rejected_size
        );
        Ok(outcome)
    }

    /// Remove an entry, releasing its preview and repairing the cover index
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.entries.len() {
            return false;
        }

        // Dropping the entry releases its preview
        drop(self.entries.remove(index));

        if self.entries.is_empty() || index == self.primary {
            self.primary = 0;
        } else if index < self.primary {
            self.primary -= 1;
        }
        true
    }

    /// Mark an entry as the cover image
    pub fn set_primary(&mut self, index: usize) -> bool {
        if index >= self.entries.len() {
            return false;
        }
        self.primary = index;
        true
    }

    /// Move an entry to a new position; the cover stays on the same image
    pub fn move_entry(&mut self, from: usize, to: usize) -> bool {
        let len = self.entries.len();
        if from >= len || to >= len {
            return false;
        }
        if from == to {
            return true;
        }

        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);

        self.primary = if self.primary == from {
            to
        } else if from < self.primary && to >= self.primary {
            self.primary - 1
        } else if from > self.primary && to <= self.primary {
            self.primary + 1
        } else {
            self.primary
        };
        true
    }

    /// Release every preview and empty the collection
    pub fn release_all(&mut self) {
        let count = self.entries.len();
        self.entries.clear();
        self.primary = 0;
        if count > 0 {
            debug!("released {} staged images", count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> StagedFile {
        StagedFile::new(PathBuf::from(format!("/tmp/{name}.png")), 1024)
    }

    fn manager(registry: &PreviewRegistry) -> ImageManager {
        ImageManager::new(registry.clone())
    }

    fn names(manager: &ImageManager) -> Vec<&str> {
        manager.entries().iter().map(|e| e.file.name.as_str()).collect()
    }

    #[test]
    fn test_staged_file_metadata() {
        let file = png("cover");
        assert_eq!(file.name, "cover.png");
        assert_eq!(file.mime, "image/png");
        assert_eq!(file.extension(), Some("png"));
        assert!(file.is_image());

        let pdf = StagedFile::new(PathBuf::from("/tmp/poster.pdf"), 10);
        assert!(pdf.is_pdf());
        assert!(!pdf.is_image());

        let bare = StagedFile::new(PathBuf::from("/tmp/README"), 10);
        assert_eq!(bare.extension(), None);
        assert_eq!(bare.mime, "application/octet-stream");
    }

    #[test]
    fn test_add_allocates_one_preview_per_image() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);

        let outcome = images.add(vec![png("a"), png("b")]).unwrap();
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.advisory(), None);
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn test_add_when_full_is_rejected() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);
        images.add((0..10).map(|i| png(&i.to_string())).collect()).unwrap();

        let err = images.add(vec![png("extra")]).unwrap_err();
        assert_eq!(err, ImageLimitError::LimitExceeded { max: 10 });
        assert_eq!(err.to_string(), "Maximum 10 images allowed");
        assert_eq!(images.len(), 10);
    }

    #[test]
    fn test_add_truncates_to_remaining_slots() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);
        images.add((0..8).map(|i| png(&i.to_string())).collect()).unwrap();

        let outcome = images.add(vec![png("x"), png("y"), png("z")]).unwrap();
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.advisory().as_deref(), Some("Only 2 more images allowed"));
        assert_eq!(images.len(), 10);
        assert_eq!(registry.live_count(), 10);
    }

    #[test]
    fn test_single_slot_message_is_singular() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);
        images.add((0..9).map(|i| png(&i.to_string())).collect()).unwrap();

        let outcome = images.add(vec![png("x"), png("y")]).unwrap();
        assert_eq!(outcome.advisory().as_deref(), Some("Only 1 more image allowed"));
    }

    #[test]
    fn test_invalid_files_do_not_consume_slots() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);
        images.add((0..8).map(|i| png(&i.to_string())).collect()).unwrap();

        let doc = StagedFile::new(PathBuf::from("/tmp/notes.txt"), 10);
        let huge = StagedFile::new(PathBuf::from("/tmp/huge.jpg"), 6 * 1024 * 1024);
        let outcome = images.add(vec![doc, huge, png("x"), png("y")]).unwrap();

        // min(remaining = 2, valid = 2)
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.rejected_type, 1);
        assert_eq!(outcome.rejected_size, 1);
        assert_eq!(outcome.advisory().as_deref(), Some("Each image must be under 5 MB"));
        assert_eq!(registry.live_count(), 10);
    }

    #[test]
    fn test_non_image_advisory() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);
        let outcome = images
            .add(vec![StagedFile::new(PathBuf::from("/tmp/a.zip"), 10)])
            .unwrap();
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.advisory().as_deref(), Some("Only image files can be added"));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_remove_primary_resets_to_zero() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);
        images.add(vec![png("a"), png("b"), png("c")]).unwrap();
        images.set_primary(2);

        assert!(images.remove(2));
        assert_eq!(images.primary_index(), 0);
        assert_eq!(registry.live_count(), 2);
        assert_eq!(registry.released_count(), 1);
    }

    #[test]
    fn test_remove_before_primary_shifts_down() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);
        images.add(vec![png("a"), png("b"), png("c")]).unwrap();
        images.set_primary(2);

        images.remove(0);
        assert_eq!(images.primary_index(), 1);
        assert_eq!(images.entries()[images.primary_index()].file.name, "c.png");
    }

    #[test]
    fn test_remove_after_primary_keeps_index() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);
        images.add(vec![png("a"), png("b"), png("c")]).unwrap();
        images.set_primary(1);

        images.remove(2);
        assert_eq!(images.primary_index(), 1);
    }

    #[test]
    fn test_remove_last_entry_resets_index() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);
        images.add(vec![png("a")]).unwrap();

        images.remove(0);
        assert!(images.is_empty());
        assert_eq!(images.primary_index(), 0);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_primary_always_in_range_after_any_removal() {
        for primary in 0..5 {
            for removed in 0..5 {
                let registry = PreviewRegistry::new();
                let mut images = manager(&registry);
                images.add((0..5).map(|i| png(&i.to_string())).collect()).unwrap();
                images.set_primary(primary);

                images.remove(removed);
                assert!(images.primary_index() < images.len());
            }
        }
    }

    #[test]
    fn test_out_of_range_operations_are_refused() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);
        images.add(vec![png("a")]).unwrap();

        assert!(!images.set_primary(3));
        assert!(!images.remove(3));
        assert!(!images.move_entry(0, 3));
        assert_eq!(images.primary_index(), 0);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_move_keeps_primary_on_same_image() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);
        images.add(vec![png("a"), png("b"), png("c"), png("d")]).unwrap();
        images.set_primary(2);

        images.move_entry(0, 3);
        assert_eq!(names(&images), vec!["b.png", "c.png", "d.png", "a.png"]);
        assert_eq!(images.entries()[images.primary_index()].file.name, "c.png");

        images.move_entry(1, 0);
        assert_eq!(images.entries()[images.primary_index()].file.name, "c.png");
        assert_eq!(images.primary_index(), 0);

        images.move_entry(3, 0);
        assert_eq!(images.entries()[images.primary_index()].file.name, "c.png");
        assert_eq!(registry.live_count(), 4);
    }

    #[test]
    fn test_release_all_releases_every_handle_once() {
        let registry = PreviewRegistry::new();
        let mut images = manager(&registry);
        images.add(vec![png("a"), png("b"), png("c")]).unwrap();
        images.remove(1);

        images.release_all();
        assert!(images.is_empty());
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.released_count(), 3);

        // A second teardown has nothing left to release
        images.release_all();
        assert_eq!(registry.released_count(), 3);
    }

    #[test]
    fn test_dropping_manager_releases_handles() {
        let registry = PreviewRegistry::new();
        {
            let mut images = manager(&registry);
            images.add(vec![png("a"), png("b")]).unwrap();
        }
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.released_count(), 2);
    }
}
