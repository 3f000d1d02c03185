//! Tenant path confinement.
//!
//! Maps a (role, username, relative path) triple to an absolute path that is
//! guaranteed to stay inside the tenant's subtree. Everything the server
//! touches on disk goes through `resolve` first.

use std::path::{Component, Path, PathBuf};

use crate::error::PathError;
use crate::users::Role;

/// Root directory a session is confined to: the whole storage tree for the
/// owner, `storage_root/username` for everyone else.
pub fn tenant_root(storage_root: &Path, role: Role, username: &str) -> PathBuf {
    match role {
        Role::Owner => storage_root.to_path_buf(),
        Role::User => storage_root.join(username),
    }
}

/// Joins `relative` onto the tenant root, normalizing lexically. Absolute
/// inputs and any `..` that would climb above the root fail closed, and if
/// the target (or its nearest existing ancestor) resolves through a symlink
/// to somewhere outside the root, that fails closed too.
pub fn resolve(tenant_root: &Path, relative: &str) -> Result<PathBuf, PathError> {
    let mut resolved = tenant_root.to_path_buf();
    let mut depth: usize = 0;

    for component in Path::new(relative).components() {
        match component {
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::Escape(relative.to_string()));
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(PathError::Escape(relative.to_string()));
                }
                resolved.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
        }
    }

    verify_real_prefix(tenant_root, &resolved, relative)?;
    Ok(resolved)
}

/// Canonicalizes the deepest existing ancestor of `candidate` and checks it
/// is still under the canonical tenant root, so symlinks cannot tunnel out.
fn verify_real_prefix(
    tenant_root: &Path,
    candidate: &Path,
    original: &str,
) -> Result<(), PathError> {
    let Ok(real_root) = tenant_root.canonicalize() else {
        // Tenant root not on disk yet; nothing to escape through.
        return Ok(());
    };

    let mut probe = candidate;
    loop {
        if let Ok(real) = probe.canonicalize() {
            if real.starts_with(&real_root) {
                return Ok(());
            }
            return Err(PathError::Escape(original.to_string()));
        }
        match probe.parent() {
            Some(parent) => probe = parent,
            None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn owner_root_is_whole_tree() {
        let root = Path::new("/srv/storage");
        assert_eq!(tenant_root(root, Role::Owner, "owner"), root);
        assert_eq!(
            tenant_root(root, Role::User, "alice"),
            root.join("alice")
        );
    }

    #[test]
    fn plain_paths_resolve_under_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("alice");
        std::fs::create_dir_all(&root).unwrap();

        let resolved = resolve(&root, "docs/notes.txt").unwrap();
        assert_eq!(resolved, root.join("docs").join("notes.txt"));

        let resolved = resolve(&root, "./docs/../readme.md").unwrap();
        assert_eq!(resolved, root.join("readme.md"));
    }

    #[test]
    fn traversal_fails_closed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("alice");
        std::fs::create_dir_all(&root).unwrap();

        for bad in [
            "..",
            "../other",
            "../../etc/passwd",
            "docs/../../other",
            "a/../../..",
        ] {
            assert!(resolve(&root, bad).is_err(), "{} escaped", bad);
        }
    }

    #[test]
    fn absolute_override_fails_closed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("alice");
        std::fs::create_dir_all(&root).unwrap();

        assert!(resolve(&root, "/etc/passwd").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_fails_closed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("alice");
        let outside = dir.path().join("bob");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        assert!(resolve(&root, "link/secret.txt").is_err());
        assert!(resolve(&root, "link").is_err());
    }

    #[test]
    fn nonexistent_targets_still_resolve() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("alice");
        std::fs::create_dir_all(&root).unwrap();

        // Writing a brand new file must be possible.
        let resolved = resolve(&root, "new/deep/file.bin").unwrap();
        assert!(resolved.starts_with(&root));
    }
}
