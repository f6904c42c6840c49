//! Locating the `git` and `gh` executables.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Resolve `command` to an executable path.
///
/// A command containing a path separator is taken as-is when it exists;
/// otherwise every `PATH` entry is searched, then the usual system
/// directories when `PATH` is empty.
pub fn find_bin(command: &str) -> Option<PathBuf> {
    let path = Path::new(command);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }

    let names = candidate_names(command);
    search_paths()
        .into_iter()
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(env_path) = std::env::var_os("PATH") {
        push_unique_paths(&mut paths, std::env::split_paths(&env_path));
    }

    if paths.is_empty() {
        push_unique_paths(&mut paths, default_search_paths());
    }

    paths
}

fn default_search_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin", "/bin"]
            .iter()
            .map(PathBuf::from)
            .collect()
    }
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        if let Some(root) = std::env::var_os("ProgramFiles") {
            paths.push(PathBuf::from(root).join("Git").join("cmd"));
        }
        paths
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        ["/usr/local/bin", "/usr/bin", "/bin"]
            .iter()
            .map(PathBuf::from)
            .collect()
    }
}

fn candidate_names(command: &str) -> Vec<OsString> {
    #[cfg(target_os = "windows")]
    {
        let mut names = vec![OsString::from(command)];
        if Path::new(command).extension().is_none() {
            names.push(OsString::from(format!("{command}.exe")));
            names.push(OsString::from(format!("{command}.cmd")));
        }
        names
    }
    #[cfg(not(target_os = "windows"))]
    {
        vec![OsString::from(command)]
    }
}

fn push_unique_paths<I>(dest: &mut Vec<PathBuf>, paths: I)
where
    I: IntoIterator<Item = PathBuf>,
{
    for path in paths {
        if !path.as_os_str().is_empty() && !dest.contains(&path) {
            dest.push(path);
        }
    }
}
