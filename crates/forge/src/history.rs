//! Version-control dates for chapters.
//!
//! The chapter transformer asks a `HistoryLookup` for dates only when
//! front-matter lacks them. Any failure here means "no dates", never an error.

use chrono::{DateTime, NaiveDate};
use git2::{DescribeFormatOptions, DescribeOptions, Repository};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Dates recorded in history for one file, formatted `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDates {
    pub created: Option<String>,
    pub updated: Option<String>,
}

/// Source of creation/modification dates for chapter files.
pub trait HistoryLookup {
    /// Dates for the file at `path`, or `None` when unavailable.
    fn dates(&self, path: &Path) -> Option<FileDates>;
}

impl<F> HistoryLookup for F
where
    F: Fn(&Path) -> Option<FileDates>,
{
    fn dates(&self, path: &Path) -> Option<FileDates> {
        self(path)
    }
}

/// Lookup that never knows any dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl HistoryLookup for NoHistory {
    fn dates(&self, _path: &Path) -> Option<FileDates> {
        None
    }
}

/// Dates from the git repository containing the book.
pub struct GitHistory {
    repo: Repository,
    workdir: PathBuf,
}

impl GitHistory {
    /// Open the repository containing `path`, if there is one.
    pub fn discover(path: &Path) -> Option<Self> {
        let repo = match Repository::discover(path) {
            Ok(repo) => repo,
            Err(e) => {
                debug!("No git repository at {}: {}", path.display(), e.message());
                return None;
            }
        };
        let workdir = repo.workdir()?;
        let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());
        Some(Self { repo, workdir })
    }

    /// Commit times (seconds) of every commit that changed `rel_path`.
    fn file_commit_times(&self, rel_path: &Path) -> Result<Vec<i64>, git2::Error> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;

        let mut times = Vec::new();
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            let tree = commit.tree()?;
            let Ok(entry) = tree.get_path(rel_path) else {
                continue;
            };

            // A commit counts when the blob differs from its first parent.
            let modified = match commit.parents().next() {
                None => true,
                Some(parent) => match parent.tree()?.get_path(rel_path) {
                    Ok(previous) => previous.id() != entry.id(),
                    Err(_) => true,
                },
            };

            if modified {
                times.push(commit.time().seconds());
            }
        }

        Ok(times)
    }

    fn relative_to_workdir(&self, path: &Path) -> Option<PathBuf> {
        let absolute = path.canonicalize().ok()?;
        absolute
            .strip_prefix(&self.workdir)
            .ok()
            .map(Path::to_path_buf)
    }

    /// Nearest tag (`v1.2`), else the abbreviated HEAD commit id.
    pub fn describe(&self) -> Option<String> {
        let mut options = DescribeOptions::new();
        options.describe_tags();
        let mut format = DescribeFormatOptions::new();
        format.abbreviated_size(0);

        match self
            .repo
            .describe(&options)
            .and_then(|d| d.format(Some(&format)))
        {
            Ok(tag) => Some(tag),
            Err(e) => {
                debug!("git describe failed: {}", e.message());
                let head = self.repo.head().ok()?.peel_to_commit().ok()?;
                Some(format!("{:.7}", head.id()))
            }
        }
    }

    /// Date of the HEAD commit.
    pub fn last_commit_date(&self) -> Option<NaiveDate> {
        let head = self.repo.head().ok()?.peel_to_commit().ok()?;
        DateTime::from_timestamp(head.time().seconds(), 0).map(|dt| dt.date_naive())
    }
}

impl HistoryLookup for GitHistory {
    fn dates(&self, path: &Path) -> Option<FileDates> {
        let rel_path = self.relative_to_workdir(path)?;

        let times = match self.file_commit_times(&rel_path) {
            Ok(times) => times,
            Err(e) => {
                warn!(
                    "Could not read git history for {}, dates omitted: {}",
                    path.display(),
                    e.message()
                );
                return None;
            }
        };

        let format = |secs: i64| {
            DateTime::from_timestamp(secs, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
        };
        let created = times.iter().min().copied().and_then(format);
        let updated = times.iter().max().copied().and_then(format);

        if created.is_none() && updated.is_none() {
            debug!("{} has no commits", rel_path.display());
            return None;
        }
        Some(FileDates { created, updated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_no_history() {
        assert_eq!(NoHistory.dates(Path::new("a.md")), None);
    }

    #[test]
    fn test_closure_lookup() {
        let lookup = |path: &Path| {
            (path == Path::new("a.md")).then(|| FileDates {
                created: Some("2024-01-01".to_string()),
                updated: None,
            })
        };
        assert!(lookup.dates(Path::new("a.md")).is_some());
        assert!(lookup.dates(Path::new("b.md")).is_none());
    }

    #[test]
    fn test_discover_outside_repository() {
        let dir = TempDir::new().unwrap();
        // Temp dirs normally live outside any repository; if not, nothing to assert.
        if Repository::discover(dir.path()).is_err() {
            assert!(GitHistory::discover(dir.path()).is_none());
        }
    }

    #[test]
    fn test_dates_from_commits() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let file = dir.path().join("chapter.md");
        std::fs::write(&file, "# One\n").unwrap();

        let sig = git2::Signature::new(
            "Author",
            "author@example.com",
            &git2::Time::new(1_705_276_800, 0),
        )
        .unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("chapter.md")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let first = repo
            .commit(Some("HEAD"), &sig, &sig, "first", &tree, &[])
            .unwrap();

        std::fs::write(&file, "# One\n\nMore\n").unwrap();
        let later = git2::Signature::new(
            "Author",
            "author@example.com",
            &git2::Time::new(1_708_041_600, 0),
        )
        .unwrap();
        index.add_path(Path::new("chapter.md")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let parent = repo.find_commit(first).unwrap();
        repo.commit(Some("HEAD"), &later, &later, "second", &tree, &[&parent])
            .unwrap();

        let history = GitHistory::discover(dir.path()).unwrap();
        let dates = history.dates(&file).unwrap();
        assert_eq!(dates.created.as_deref(), Some("2024-01-15"));
        assert_eq!(dates.updated.as_deref(), Some("2024-02-16"));

        assert_eq!(
            history.last_commit_date(),
            NaiveDate::from_ymd_opt(2024, 2, 16)
        );
        assert_eq!(history.describe().map(|d| d.len()), Some(7));
        assert_eq!(history.dates(&dir.path().join("missing.md")), None);
    }
}
