// src/media.rs - Removable media backend and index-addressable file listing
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;

use crate::config::MediaConfig;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Mount failed: {0}")]
    Mount(String),
}

/// One directory entry as the UI addresses it.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEntry {
    pub short_name: String,
    pub long_name: Option<String>,
    pub is_dir: bool,
}

/// Storage subsystem consumed by the bridge and the file list.
pub trait MediaBackend {
    fn is_inserted(&self) -> bool;
    fn mount(&mut self) -> Result<(), MediaError>;
    fn release(&mut self);
    fn is_mounted(&self) -> bool;

    /// Number of entries in the current directory.
    fn entry_count(&self) -> u16;
    /// Entry at `index` in the configured sort order, or None past the end.
    fn entry_at(&self, index: u16) -> Option<MediaEntry>;
    fn is_at_root(&self) -> bool;
    fn change_dir(&mut self, name: &str);
    fn up_dir(&mut self);

    fn open_and_print(&mut self, name: &str) -> bool;
    fn is_file_open(&self) -> bool;
    /// True while media playback is actively feeding the printer.
    fn is_playing(&self) -> bool;
    /// Advance playback by one control cycle. Returns true when the open file
    /// finished on this cycle; the backend closes it.
    fn advance_playback(&mut self) -> bool;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
}

/// Shared handle to a media backend; the bridge and file list both poke it
/// from the single control loop.
pub type SharedMedia = Rc<RefCell<dyn MediaBackend>>;

/// Cached entry count sentinel: "not computed yet", distinct from zero.
const COUNT_UNKNOWN: u16 = 0xFFFF;

/// Lazily-counted, index-addressable listing over the media backend.
///
/// The entry count is computed on first access after construction,
/// `refresh()`, or any directory navigation, all of which change the
/// addressable entry set.
pub struct FileList {
    media: Option<SharedMedia>,
    num_files: u16,
    selected: Option<MediaEntry>,
    recent_first: bool,
}

impl FileList {
    pub fn new(media: Option<SharedMedia>, recent_first: bool) -> Self {
        let mut list = Self {
            media,
            num_files: COUNT_UNKNOWN,
            selected: None,
            recent_first,
        };
        list.refresh();
        list
    }

    /// Invalidate the cached entry count.
    pub fn refresh(&mut self) {
        self.num_files = COUNT_UNKNOWN;
    }

    pub fn count(&mut self) -> u16 {
        let Some(media) = &self.media else {
            return 0;
        };
        if self.num_files == COUNT_UNKNOWN {
            self.num_files = media.borrow().entry_count();
        }
        self.num_files
    }

    /// Select the entry at logical `pos`. Returns false when out of range
    /// (unless the check is skipped) or the backing entry has no name.
    pub fn seek(&mut self, pos: u16, skip_range_check: bool) -> bool {
        if self.media.is_none() {
            return false;
        }
        if !skip_range_check && pos as u32 + 1 > self.count() as u32 {
            return false;
        }
        let nr = if self.recent_first {
            self.count().saturating_sub(1).saturating_sub(pos)
        } else {
            pos
        };
        let Some(media) = &self.media else {
            return false;
        };
        self.selected = media.borrow().entry_at(nr);
        self.selected
            .as_ref()
            .is_some_and(|e| !e.short_name.is_empty())
    }

    /// Long name when present, else short name, else empty without a backend.
    pub fn filename(&self) -> &str {
        match &self.selected {
            Some(e) => e.long_name.as_deref().unwrap_or(&e.short_name),
            None => "",
        }
    }

    pub fn short_filename(&self) -> &str {
        self.selected.as_ref().map_or("", |e| &e.short_name)
    }

    pub fn long_filename(&self) -> &str {
        self.selected
            .as_ref()
            .and_then(|e| e.long_name.as_deref())
            .unwrap_or("")
    }

    pub fn is_dir(&self) -> bool {
        self.selected.as_ref().is_some_and(|e| e.is_dir)
    }

    pub fn is_at_root(&self) -> bool {
        self.media
            .as_ref()
            .is_none_or(|m| m.borrow().is_at_root())
    }

    pub fn up_dir(&mut self) {
        if let Some(media) = &self.media {
            media.borrow_mut().up_dir();
            self.num_files = COUNT_UNKNOWN;
        }
    }

    pub fn change_dir(&mut self, dirname: &str) {
        if let Some(media) = &self.media {
            media.borrow_mut().change_dir(dirname);
            self.num_files = COUNT_UNKNOWN;
        }
    }
}

/// Media backend over a host directory. Stands in for the SD card driver.
pub struct DirMedia {
    root: PathBuf,
    cwd: PathBuf,
    inserted: bool,
    mounted: bool,
    open_file: Option<String>,
    paused: bool,
    /// Lines of the open file not yet played back.
    remaining_lines: usize,
}

impl DirMedia {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root),
            cwd: PathBuf::new(),
            inserted: true,
            mounted: false,
            open_file: None,
            paused: false,
            remaining_lines: 0,
        }
    }

    /// Simulate physical card removal or insertion.
    pub fn set_inserted(&mut self, inserted: bool) {
        self.inserted = inserted;
    }

    fn current_dir(&self) -> PathBuf {
        self.root.join(&self.cwd)
    }

    fn sorted_entries(&self) -> Vec<MediaEntry> {
        let Ok(read) = std::fs::read_dir(self.current_dir()) else {
            return Vec::new();
        };
        let mut entries: Vec<MediaEntry> = read
            .flatten()
            .filter_map(|e| {
                let name = e.file_name().to_str()?.to_string();
                let is_dir = e.file_type().ok()?.is_dir();
                Some(MediaEntry {
                    short_name: short_name_of(&name),
                    long_name: Some(name),
                    is_dir,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.long_name.cmp(&b.long_name));
        entries
    }
}

/// Derive a DOS-style 8.3 short name from a long name.
fn short_name_of(name: &str) -> String {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() => (s, e),
        _ => (name, ""),
    };
    let clean = |s: &str, max: usize| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(max)
            .collect::<String>()
            .to_ascii_uppercase()
    };
    let stem8 = clean(stem, 8);
    let ext3 = clean(ext, 3);
    if ext3.is_empty() {
        stem8
    } else {
        format!("{}.{}", stem8, ext3)
    }
}

impl MediaBackend for DirMedia {
    fn is_inserted(&self) -> bool {
        self.inserted
    }

    fn mount(&mut self) -> Result<(), MediaError> {
        if !self.inserted {
            return Err(MediaError::Mount("no media present".to_string()));
        }
        if !self.root.is_dir() {
            return Err(MediaError::Mount(format!(
                "media root '{}' is not a directory",
                self.root.display()
            )));
        }
        self.mounted = true;
        self.cwd = PathBuf::new();
        tracing::info!("Media mounted at '{}'", self.root.display());
        Ok(())
    }

    fn release(&mut self) {
        if self.mounted {
            tracing::info!("Media released");
        }
        self.mounted = false;
        self.open_file = None;
        self.paused = false;
        self.remaining_lines = 0;
        self.cwd = PathBuf::new();
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn entry_count(&self) -> u16 {
        if !self.mounted {
            return 0;
        }
        self.sorted_entries().len().min(u16::MAX as usize - 1) as u16
    }

    fn entry_at(&self, index: u16) -> Option<MediaEntry> {
        if !self.mounted {
            return None;
        }
        self.sorted_entries().into_iter().nth(index as usize)
    }

    fn is_at_root(&self) -> bool {
        self.cwd.as_os_str().is_empty()
    }

    fn change_dir(&mut self, name: &str) {
        // Reject separators; navigation is one level at a time.
        if name.contains('/') || name.contains('\\') {
            return;
        }
        let next = self.cwd.join(name);
        if self.root.join(&next).is_dir() {
            self.cwd = next;
        }
    }

    fn up_dir(&mut self) {
        self.cwd.pop();
    }

    fn open_and_print(&mut self, name: &str) -> bool {
        if !self.mounted {
            return false;
        }
        let path = self.current_dir().join(name);
        if !path.is_file() {
            tracing::warn!("Cannot print '{}': not a file", name);
            return false;
        }
        // One playback cycle per g-code line; an empty file still takes one.
        self.remaining_lines = std::fs::read_to_string(&path)
            .map(|s| s.lines().count())
            .unwrap_or(0)
            .max(1);
        self.open_file = Some(name.to_string());
        self.paused = false;
        true
    }

    fn is_file_open(&self) -> bool {
        self.open_file.is_some()
    }

    fn is_playing(&self) -> bool {
        self.open_file.is_some() && !self.paused
    }

    fn advance_playback(&mut self) -> bool {
        if self.open_file.is_none() || self.paused {
            return false;
        }
        self.remaining_lines = self.remaining_lines.saturating_sub(1);
        if self.remaining_lines == 0 {
            self.open_file = None;
            self.paused = false;
            return true;
        }
        false
    }

    fn pause(&mut self) {
        if self.open_file.is_some() {
            self.paused = true;
        }
    }

    fn resume(&mut self) {
        if self.open_file.is_some() {
            self.paused = false;
        }
    }

    fn stop(&mut self) {
        self.open_file = None;
        self.paused = false;
        self.remaining_lines = 0;
    }
}
