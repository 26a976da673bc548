//! Recursive copy of the deployable application bundle into a replica
//! destination.
//!
//! Blocking; callers on the async runtime go through
//! [`tokio::task::spawn_blocking`].

use std::{
  ffi::{OsStr, OsString},
  fs,
  path::{Path, PathBuf},
};

use crate::{Error, Result, provision::REPLICA_DB_FILE};

/// Paths that never leave the central installation.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
  /// Directory trees skipped entirely (the instances root).
  pub dirs:      Vec<PathBuf>,
  /// A database file skipped together with its `-wal`/`-shm`/`-journal`
  /// siblings (the central store).
  pub databases: Vec<PathBuf>,
}

impl Exclusions {
  /// Resolve every configured path so it compares equal to walked entries.
  pub fn resolved(self) -> Result<Self> {
    let resolve = |p: PathBuf| crate::sandbox::resolve(&p).map_err(|e| Error::io(p, e));
    Ok(Self {
      dirs:      self.dirs.into_iter().map(resolve).collect::<Result<_>>()?,
      databases: self.databases.into_iter().map(resolve).collect::<Result<_>>()?,
    })
  }

  fn excludes(&self, path: &Path) -> bool {
    if self.dirs.iter().any(|d| path.starts_with(d)) {
      return true;
    }
    // The destination's own replica database and its side files.
    if path
      .file_name()
      .and_then(OsStr::to_str)
      .is_some_and(|name| name.starts_with(REPLICA_DB_FILE))
    {
      return true;
    }
    self.databases.iter().any(|db| is_database_file(path, db))
  }
}

/// `path` is `db` itself or one of SQLite's side files next to it.
fn is_database_file(path: &Path, db: &Path) -> bool {
  let (Some(parent), Some(name), Some(db_parent), Some(db_name)) =
    (path.parent(), path.file_name(), db.parent(), db.file_name())
  else {
    return false;
  };
  if parent != db_parent {
    return false;
  }
  ["", "-wal", "-shm", "-journal"].iter().any(|suffix| {
    let mut candidate = OsString::from(db_name);
    candidate.push(suffix);
    candidate.as_os_str() == name
  })
}

/// Summary of one bundle copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
  pub files:   usize,
  pub dirs:    usize,
  pub skipped: usize,
}

/// Copy `src` into `dest`, overwriting existing files.
///
/// Symlinks are skipped, never followed. The destination itself is always
/// excluded, so copying a bundle into a directory below it terminates.
pub fn copy_bundle(src: &Path, dest: &Path, exclusions: &Exclusions) -> Result<CopyStats> {
  let src = fs::canonicalize(src).map_err(|e| Error::io(src, e))?;
  fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
  let dest_resolved = fs::canonicalize(dest).map_err(|e| Error::io(dest, e))?;

  let mut stats = CopyStats::default();
  copy_dir(&src, &dest_resolved, &dest_resolved, exclusions, &mut stats)?;
  Ok(stats)
}

fn copy_dir(
  src: &Path,
  dest: &Path,
  dest_root: &Path,
  exclusions: &Exclusions,
  stats: &mut CopyStats,
) -> Result<()> {
  let entries = fs::read_dir(src).map_err(|e| Error::io(src, e))?;

  for entry in entries {
    let entry = entry.map_err(|e| Error::io(src, e))?;
    let path = entry.path();

    if path.starts_with(dest_root) || exclusions.excludes(&path) {
      tracing::debug!(path = %path.display(), "excluded from bundle");
      stats.skipped += 1;
      continue;
    }

    let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
    let target = dest.join(entry.file_name());

    if file_type.is_dir() {
      fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
      stats.dirs += 1;
      copy_dir(&path, &target, dest_root, exclusions, stats)?;
    } else if file_type.is_file() {
      fs::copy(&path, &target).map_err(|e| Error::io(&target, e))?;
      stats.files += 1;
    } else {
      tracing::debug!(path = %path.display(), "skipping non-regular file");
      stats.skipped += 1;
    }
  }

  Ok(())
}
