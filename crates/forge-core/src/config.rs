//! Pipeline configuration.
//!
//! Defaults reproduce the canonical workspace layout:
//!
//! ```text
//! <workspace>/
//!   custom.py            build configuration, copied into the engine tree
//!   modules/python/      embedded Python bridge sources
//!   modules/uiverse/     Uiverse.io UI component sources
//!   godot/               upstream tree (cloned on first run)
//!   build/               output directory
//! ```
//!
//! Any field can be overridden from `FORGE_*` environment variables and
//! then from command-line flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use forge_host::HostPlatform;
use serde::{Deserialize, Serialize};

pub const DEFAULT_UPSTREAM_URL: &str = "https://github.com/godotengine/godot.git";
pub const DEFAULT_UPSTREAM_REF: &str = "3.x";
pub const DEFAULT_UPSTREAM_DIR: &str = "godot";
pub const DEFAULT_BUILD_DIR: &str = "build";
pub const DEFAULT_CONFIG_FILE: &str = "custom.py";

/// Name SCons reads the build configuration from, inside the engine root.
pub const ENGINE_CONFIG_FILE: &str = "custom.py";

/// Directory, relative to both the workspace and the engine tree, holding modules.
pub const MODULES_DIR: &str = "modules";

/// Custom modules merged into the engine, in integration order.
pub const DEFAULT_MODULES: &[&str] = &["python", "uiverse"];

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: expected {expected}")]
    InvalidValue {
        var: String,
        value: String,
        expected: &'static str,
    },
}

/// Upstream engine repository and the ref it is pinned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSpec {
    /// Remote to clone from.
    pub url: String,

    /// Branch or tag checked out on every run.
    pub pinned_ref: String,

    /// Local directory of the tree.
    pub dir: PathBuf,
}

/// A custom module copied into the engine tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Logical name, e.g. `python`.
    pub name: String,

    /// Directory whose contents are copied.
    pub source: PathBuf,

    /// Destination, relative to the engine tree root.
    pub destination: PathBuf,
}

impl ModuleSpec {
    pub fn new(name: &str, source: PathBuf, destination: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            source,
            destination,
        }
    }

    /// `<workspace>/modules/<name>` → `<engine>/modules/<name>`.
    pub fn standard(name: &str, workspace: &Path) -> Self {
        Self::new(
            name,
            workspace.join(MODULES_DIR).join(name),
            Path::new(MODULES_DIR).join(name),
        )
    }
}

/// What to do when a pre-existing engine tree has modified tracked files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyTreePolicy {
    /// Log the modified files and continue.
    #[default]
    Warn,
    /// Abort provisioning.
    Refuse,
    /// Do not look.
    Ignore,
}

impl FromStr for DirtyTreePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warn" => Ok(DirtyTreePolicy::Warn),
            "refuse" => Ok(DirtyTreePolicy::Refuse),
            "ignore" => Ok(DirtyTreePolicy::Ignore),
            other => Err(format!("unknown dirty-tree policy: {}", other)),
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Root all relative paths are resolved against.
    pub workspace: PathBuf,

    /// Upstream engine repository (`dir` may be relative).
    pub upstream: RepoSpec,

    /// Modules to integrate (`source` may be relative to the workspace).
    pub modules: Vec<ModuleSpec>,

    /// Build configuration file copied into the engine root.
    pub config_file: PathBuf,

    /// Output directory created if absent.
    pub build_dir: PathBuf,

    /// Python interpreter to use; probed from PATH when unset.
    pub python: Option<String>,

    /// Handling of local modifications in an existing tree.
    pub dirty_tree: DirtyTreePolicy,

    /// Platform branch used by the toolchain checks.
    pub platform: HostPlatform,

    /// Where to write the JSON run report, if anywhere.
    pub report_path: Option<PathBuf>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self::for_workspace(PathBuf::from("."))
    }
}

impl ForgeConfig {
    /// Default layout rooted at `workspace`.
    pub fn for_workspace(workspace: PathBuf) -> Self {
        ForgeConfig {
            upstream: RepoSpec {
                url: DEFAULT_UPSTREAM_URL.to_string(),
                pinned_ref: DEFAULT_UPSTREAM_REF.to_string(),
                dir: PathBuf::from(DEFAULT_UPSTREAM_DIR),
            },
            modules: DEFAULT_MODULES
                .iter()
                .map(|name| {
                    ModuleSpec::new(
                        name,
                        Path::new(MODULES_DIR).join(name),
                        Path::new(MODULES_DIR).join(name),
                    )
                })
                .collect(),
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            build_dir: PathBuf::from(DEFAULT_BUILD_DIR),
            python: None,
            dirty_tree: DirtyTreePolicy::default(),
            platform: HostPlatform::current(),
            report_path: None,
            workspace,
        }
    }

    /// Defaults overridden by `FORGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ForgeConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let workspace = lookup("FORGE_WORKSPACE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut config = Self::for_workspace(workspace);

        if let Some(url) = lookup("FORGE_UPSTREAM_URL") {
            config.upstream.url = url;
        }
        if let Some(pinned) = lookup("FORGE_UPSTREAM_REF") {
            config.upstream.pinned_ref = pinned;
        }
        if let Some(dir) = lookup("FORGE_UPSTREAM_DIR") {
            config.upstream.dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("FORGE_BUILD_DIR") {
            config.build_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup("FORGE_CONFIG_FILE") {
            config.config_file = PathBuf::from(file);
        }
        if let Some(python) = lookup("FORGE_PYTHON") {
            config.python = Some(python);
        }
        if let Some(policy) = lookup("FORGE_DIRTY_TREE") {
            config.dirty_tree = policy.parse().map_err(|_| ConfigError::InvalidValue {
                var: "FORGE_DIRTY_TREE".to_string(),
                value: policy.clone(),
                expected: "warn, refuse or ignore",
            })?;
        }

        Ok(config)
    }

    /// Resolve a possibly relative path against the workspace.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Upstream spec with its directory resolved.
    pub fn resolved_upstream(&self) -> RepoSpec {
        RepoSpec {
            dir: self.resolve(&self.upstream.dir),
            ..self.upstream.clone()
        }
    }

    /// Module specs with their sources resolved.
    pub fn resolved_modules(&self) -> Vec<ModuleSpec> {
        self.modules
            .iter()
            .map(|m| ModuleSpec {
                source: self.resolve(&m.source),
                ..m.clone()
            })
            .collect()
    }

    pub fn upstream_dir(&self) -> PathBuf {
        self.resolve(&self.upstream.dir)
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.resolve(&self.config_file)
    }

    pub fn build_dir_path(&self) -> PathBuf {
        self.resolve(&self.build_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_layout() {
        let config = ForgeConfig::for_workspace(PathBuf::from("/ws"));
        assert_eq!(config.upstream.url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.upstream.pinned_ref, "3.x");
        assert_eq!(config.upstream_dir(), PathBuf::from("/ws/godot"));
        assert_eq!(config.config_file_path(), PathBuf::from("/ws/custom.py"));
        assert_eq!(config.build_dir_path(), PathBuf::from("/ws/build"));

        let names: Vec<_> = config.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["python", "uiverse"]);
    }

    #[test]
    fn test_resolved_modules_keep_relative_destination() {
        let config = ForgeConfig::for_workspace(PathBuf::from("/ws"));
        let modules = config.resolved_modules();
        assert_eq!(modules[0].source, PathBuf::from("/ws/modules/python"));
        assert_eq!(modules[0].destination, PathBuf::from("modules/python"));
    }

    #[test]
    fn test_absolute_paths_are_not_rebased() {
        let mut config = ForgeConfig::for_workspace(PathBuf::from("/ws"));
        config.build_dir = PathBuf::from("/tmp/out");
        assert_eq!(config.build_dir_path(), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FORGE_WORKSPACE", "/work"),
            ("FORGE_UPSTREAM_REF", "3.5-stable"),
            ("FORGE_PYTHON", "python3.11"),
            ("FORGE_DIRTY_TREE", "refuse"),
        ]
        .into_iter()
        .collect();

        let config = ForgeConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.workspace, PathBuf::from("/work"));
        assert_eq!(config.upstream.pinned_ref, "3.5-stable");
        assert_eq!(config.python.as_deref(), Some("python3.11"));
        assert_eq!(config.dirty_tree, DirtyTreePolicy::Refuse);
        assert_eq!(config.upstream.url, DEFAULT_UPSTREAM_URL);
    }

    #[test]
    fn test_from_lookup_rejects_bad_policy() {
        let err = ForgeConfig::from_lookup(|k| {
            (k == "FORGE_DIRTY_TREE").then(|| "sometimes".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("FORGE_DIRTY_TREE"));
    }

    #[test]
    fn test_standard_module_spec() {
        let spec = ModuleSpec::standard("uiverse", Path::new("/ws"));
        assert_eq!(spec.source, PathBuf::from("/ws/modules/uiverse"));
        assert_eq!(spec.destination, PathBuf::from("modules/uiverse"));
    }

    #[test]
    fn test_dirty_tree_policy_parse() {
        assert_eq!("WARN".parse::<DirtyTreePolicy>(), Ok(DirtyTreePolicy::Warn));
        assert_eq!("ignore".parse::<DirtyTreePolicy>(), Ok(DirtyTreePolicy::Ignore));
        assert!("maybe".parse::<DirtyTreePolicy>().is_err());
    }
}
