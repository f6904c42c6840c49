//! Repository detection.

use std::path::{Path, PathBuf};

/// Repository enclosing the current directory.
pub fn detect_git_repo() -> Option<PathBuf> {
    let current = std::env::current_dir().ok()?;
    get_git_root(&current)
}

/// Closest ancestor of `path` (itself included) holding a `.git` entry.
/// Worktrees and submodules have a `.git` file rather than a directory.
pub fn get_git_root(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|p| p.join(".git").exists())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_get_git_root_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("src").join("infra");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(get_git_root(&nested), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_get_git_root_accepts_worktree_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".git"), "gitdir: /elsewhere/.git/worktrees/x\n").unwrap();
        assert_eq!(get_git_root(dir.path()), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_get_git_root_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(get_git_root(dir.path()), None);
    }
}
