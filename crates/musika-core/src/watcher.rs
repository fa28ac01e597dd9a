//! Locate the artifact the generation workload wrote.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A file discovered in the output directory. The orchestrator only reads
/// its metadata; the file belongs to whatever wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

impl OutputArtifact {
    /// Path as reported to the caller, using the host's separators.
    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    /// Whether this file appeared or was rewritten after `baseline` was
    /// taken. With no baseline any file counts as new.
    pub fn is_newer_than(&self, baseline: Option<&OutputArtifact>) -> bool {
        match baseline {
            None => true,
            Some(before) => {
                self.modified > before.modified
                    || (self.modified == before.modified && self.path != before.path)
            }
        }
    }
}

/// Stateless query over an output directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutputWatcher;

impl OutputWatcher {
    /// Most recently modified regular file in `directory` whose extension
    /// matches `extension` (ASCII case-insensitive, leading dot optional).
    ///
    /// Equal modification times are broken by file name, largest wins.
    /// A missing or unreadable directory yields `None`.
    pub fn latest(directory: &Path, extension: &str) -> Option<OutputArtifact> {
        let wanted = extension.trim_start_matches('.');
        let entries = match std::fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(directory = %directory.display(), error = %err, "output directory not readable");
                return None;
            }
        };

        let mut best: Option<(SystemTime, PathBuf)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(wanted))
                .unwrap_or(false);
            if !matches {
                continue;
            }

            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let Ok(modified) = meta.modified() else {
                continue;
            };

            let newer = match &best {
                None => true,
                Some((t, p)) => (modified, path.file_name()) > (*t, p.file_name()),
            };
            if newer {
                best = Some((modified, path));
            }
        }

        best.map(|(modified, path)| OutputArtifact {
            path,
            modified: DateTime::<Utc>::from(modified),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"RIFF").unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    #[test]
    fn test_picks_newest_matching_file() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.wav", 300);
        let newest = touch(dir.path(), "b.wav", 10);
        touch(dir.path(), "c.wav", 120);

        let found = OutputWatcher::latest(dir.path(), "wav").unwrap();
        assert_eq!(found.path, newest);
    }

    #[test]
    fn test_ignores_other_extensions_and_directories() {
        let dir = tempdir().unwrap();
        let wav = touch(dir.path(), "take.wav", 60);
        touch(dir.path(), "notes.txt", 1);
        std::fs::create_dir(dir.path().join("fresh.wav")).unwrap();

        let found = OutputWatcher::latest(dir.path(), ".wav").unwrap();
        assert_eq!(found.path, wav);
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let upper = touch(dir.path(), "LOUD.WAV", 5);
        assert_eq!(OutputWatcher::latest(dir.path(), "wav").unwrap().path, upper);
    }

    #[test]
    fn test_tie_breaks_on_name() {
        let dir = tempdir().unwrap();
        let a = touch(dir.path(), "a.wav", 30);
        let b = touch(dir.path(), "b.wav", 30);
        let same = File::open(&a).unwrap().metadata().unwrap().modified().unwrap();
        File::options()
            .write(true)
            .open(&b)
            .unwrap()
            .set_modified(same)
            .unwrap();

        assert_eq!(OutputWatcher::latest(dir.path(), "wav").unwrap().path, b);
    }

    #[test]
    fn test_freshness_against_baseline() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "old.wav", 3600);
        let before = OutputWatcher::latest(dir.path(), "wav").unwrap();

        // Nothing written since the baseline: same file, not new.
        let again = OutputWatcher::latest(dir.path(), "wav").unwrap();
        assert!(!again.is_newer_than(Some(&before)));

        touch(dir.path(), "new.wav", 0);
        let after = OutputWatcher::latest(dir.path(), "wav").unwrap();
        assert!(after.is_newer_than(Some(&before)));
        assert!(before.is_newer_than(None));
    }

    #[test]
    fn test_rewritten_file_counts_as_new() {
        let dir = tempdir().unwrap();
        let path = touch(dir.path(), "take.wav", 600);
        let before = OutputWatcher::latest(dir.path(), "wav").unwrap();

        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now())
            .unwrap();
        let after = OutputWatcher::latest(dir.path(), "wav").unwrap();
        assert_eq!(after.path, before.path);
        assert!(after.is_newer_than(Some(&before)));
    }

    #[test]
    fn test_older_file_surfacing_is_not_new() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "older.wav", 900);
        let newest = touch(dir.path(), "newest.wav", 60);
        let before = OutputWatcher::latest(dir.path(), "wav").unwrap();

        std::fs::remove_file(newest).unwrap();
        let after = OutputWatcher::latest(dir.path(), "wav").unwrap();
        assert!(!after.is_newer_than(Some(&before)));
    }

    #[test]
    fn test_empty_or_missing_directory_is_none() {
        let dir = tempdir().unwrap();
        assert!(OutputWatcher::latest(dir.path(), "wav").is_none());
        assert!(OutputWatcher::latest(&dir.path().join("missing"), "wav").is_none());
    }
}
