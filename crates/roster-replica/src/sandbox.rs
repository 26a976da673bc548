//! Filesystem sandbox for replica destinations.
//!
//! A destination is accepted only if it resolves strictly below the
//! instances root. Resolution never touches the filesystem beyond reading
//! metadata, so the check can run before anything is created.

use std::{
  io,
  path::{Component, Path, PathBuf},
};

use crate::{Error, Result};

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// The result is a single path component, but may still be `.`, `..`, or
/// empty; [`PathSandbox`] rejects those.
pub fn sanitize_username(username: &str) -> String {
  username
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' }
    })
    .collect()
}

/// Resolve `path` to an absolute path without requiring it to exist.
///
/// The longest existing ancestor is canonicalised (following symlinks); the
/// remaining components are applied lexically.
pub fn resolve(path: &Path) -> io::Result<PathBuf> {
  let absolute = if path.is_absolute() {
    path.to_path_buf()
  } else {
    std::env::current_dir()?.join(path)
  };

  let components: Vec<Component<'_>> = absolute.components().collect();
  for split in (1..=components.len()).rev() {
    let prefix: PathBuf = components[..split].iter().collect();
    match std::fs::canonicalize(&prefix) {
      Ok(mut out) => {
        for c in &components[split..] {
          match c {
            Component::Normal(name) => out.push(name),
            Component::ParentDir => {
              out.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
          }
        }
        return Ok(out);
      }
      Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
        continue;
      }
      Err(e) => return Err(e),
    }
  }

  Err(io::Error::new(
    io::ErrorKind::NotFound,
    format!("no existing ancestor for {}", absolute.display()),
  ))
}

/// `true` iff `candidate` resolves to a strict descendant of `root`.
pub fn is_contained(candidate: &Path, root: &Path) -> io::Result<bool> {
  Ok(strictly_below(&resolve(candidate)?, &resolve(root)?))
}

/// Component-wise, so `root-evil` is not below `root`.
fn strictly_below(resolved: &Path, root: &Path) -> bool {
  resolved != root && resolved.starts_with(root)
}

/// Guards destinations below one root directory.
#[derive(Debug, Clone)]
pub struct PathSandbox {
  root: PathBuf,
}

impl PathSandbox {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  /// Resolve `candidate` and fail with [`Error::Sandbox`] unless it lies
  /// strictly inside the root. Returns the resolved path.
  pub fn check(&self, candidate: &Path) -> Result<PathBuf> {
    let resolved = resolve(candidate).map_err(|e| Error::io(candidate, e))?;
    let root = resolve(&self.root).map_err(|e| Error::io(&self.root, e))?;

    if !strictly_below(&resolved, &root) {
      tracing::warn!(candidate = %candidate.display(), root = %root.display(), "sandbox violation");
      return Err(Error::Sandbox { candidate: candidate.to_path_buf(), root });
    }
    Ok(resolved)
  }

  /// Sanitise `username`, join it to the root, and check the result.
  pub fn destination_for(&self, username: &str) -> Result<PathBuf> {
    self.check(&self.root.join(sanitize_username(username)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sanitize_keeps_allowed_characters() {
    assert_eq!(sanitize_username("amal.b-2_x"), "amal.b-2_x");
  }

  #[test]
  fn sanitize_replaces_separators_and_unicode() {
    assert_eq!(sanitize_username("../etc/passwd"), ".._etc_passwd");
    assert_eq!(sanitize_username("a b\\c"), "a_b_c");
    assert_eq!(sanitize_username("أمل"), "___");
  }

  #[test]
  fn resolve_handles_missing_tail() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let resolved = resolve(&dir.path().join("a/./b/../c")).unwrap();
    assert_eq!(resolved, root.join("a/c"));
  }

  #[test]
  fn plain_username_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = PathSandbox::new(dir.path().join("instances"));
    let dest = sandbox.destination_for("amal").unwrap();
    assert!(dest.ends_with("instances/amal"));
    // Nothing was created by the check.
    assert!(!dir.path().join("instances").exists());
  }

  #[test]
  fn traversal_usernames_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = PathSandbox::new(dir.path().join("instances"));
    for name in ["..", ".", ""] {
      assert!(
        matches!(sandbox.destination_for(name), Err(Error::Sandbox { .. })),
        "accepted {name:?}"
      );
    }
  }

  #[test]
  fn slash_traversal_is_neutralised_by_sanitising() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = PathSandbox::new(dir.path().join("instances"));
    let dest = sandbox.destination_for("../../outside").unwrap();
    assert!(dest.ends_with("instances/.._.._outside"));
  }

  #[test]
  fn raw_candidate_outside_root_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = PathSandbox::new(dir.path().join("instances"));
    let outside = dir.path().join("instances/../elsewhere");
    assert!(matches!(sandbox.check(&outside), Err(Error::Sandbox { .. })));
  }

  #[test]
  fn sibling_with_root_prefix_is_not_contained() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("instances");
    let sibling = dir.path().join("instances-evil/amal");
    assert!(!is_contained(&sibling, &root).unwrap());
  }

  #[test]
  fn check_agrees_with_is_contained() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("instances");
    let sandbox = PathSandbox::new(&root);
    for candidate in [
      root.join("amal"),
      root.join("a/b/../c"),
      root.clone(),
      root.join("amal/.."),
      dir.path().join("instances-evil/amal"),
      dir.path().join("elsewhere"),
    ] {
      assert_eq!(
        sandbox.check(&candidate).is_ok(),
        is_contained(&candidate, &root).unwrap(),
        "disagree on {}",
        candidate.display()
      );
    }
  }

  #[cfg(unix)]
  #[test]
  fn symlink_escape_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("instances");
    let outside = dir.path().join("outside");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::create_dir_all(&outside).unwrap();
    std::os::unix::fs::symlink(&outside, root.join("amal")).unwrap();

    let sandbox = PathSandbox::new(&root);
    assert!(matches!(sandbox.destination_for("amal"), Err(Error::Sandbox { .. })));
  }
}
