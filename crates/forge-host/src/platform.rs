//! Host platform identification and PATH lookup.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

/// Operating systems the toolchain checks distinguish between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostPlatform {
    Windows,
    Linux,
    MacOs,
    /// Any other Unix-like system
    Other,
}

impl HostPlatform {
    /// Platform this binary was compiled for.
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` value onto a platform.
    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => HostPlatform::Windows,
            "linux" => HostPlatform::Linux,
            "macos" => HostPlatform::MacOs,
            _ => HostPlatform::Other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HostPlatform::Windows => "windows",
            HostPlatform::Linux => "linux",
            HostPlatform::MacOs => "macos",
            HostPlatform::Other => "other",
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Extensions tried on Windows when PATHEXT is unset.
const DEFAULT_PATHEXT: &[&str] = &[".exe", ".cmd", ".bat", ".com"];

/// Find `program` in the directories of a PATH-style value.
///
/// On Windows the PATHEXT extensions are tried as well.
pub fn find_executable(program: &str, path: &OsStr) -> Option<PathBuf> {
    let extensions = executable_extensions();

    std::env::split_paths(path).find_map(|dir| {
        let bare = dir.join(program);
        if is_executable(&bare) {
            return Some(bare);
        }
        extensions
            .iter()
            .map(|ext| dir.join(format!("{}{}", program, ext)))
            .find(|candidate| is_executable(candidate))
    })
}

fn executable_extensions() -> Vec<String> {
    if !cfg!(windows) {
        return Vec::new();
    }
    match std::env::var("PATHEXT") {
        Ok(value) => value
            .split(';')
            .filter(|ext| !ext.is_empty())
            .map(|ext| ext.to_ascii_lowercase())
            .collect(),
        Err(_) => DEFAULT_PATHEXT.iter().map(|ext| ext.to_string()).collect(),
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_os_maps_known_systems() {
        assert_eq!(HostPlatform::from_os("windows"), HostPlatform::Windows);
        assert_eq!(HostPlatform::from_os("linux"), HostPlatform::Linux);
        assert_eq!(HostPlatform::from_os("macos"), HostPlatform::MacOs);
        assert_eq!(HostPlatform::from_os("freebsd"), HostPlatform::Other);
    }

    #[test]
    fn test_current_matches_consts() {
        assert_eq!(
            HostPlatform::current(),
            HostPlatform::from_os(std::env::consts::OS)
        );
    }

    #[test]
    fn test_find_executable_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = std::env::join_paths([dir.path()]).unwrap();
        assert!(find_executable("mono", &path).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_find_executable_in_second_dir() {
        use std::os::unix::fs::PermissionsExt;

        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let exe = second.path().join("msbuild");
        std::fs::write(&exe, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let path = std::env::join_paths([first.path(), second.path()]).unwrap();
        assert_eq!(find_executable("msbuild", &path), Some(exe));
    }

    #[cfg(unix)]
    #[test]
    fn test_find_executable_skips_non_executable_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mono"), "not a binary").unwrap();
        let path = std::env::join_paths([dir.path()]).unwrap();
        assert!(find_executable("mono", &path).is_none());
    }
}
