//! Next-step build instructions printed after a successful run.

use crate::build_config::BuildConfig;
use forge_host::HostPlatform;
use std::fmt::Write as _;

/// SCons invocation for one target platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildHint {
    pub platform: HostPlatform,
    pub label: &'static str,
    pub command: &'static str,
}

/// Editor build commands for each supported host.
pub fn build_hints() -> Vec<BuildHint> {
    vec![
        BuildHint {
            platform: HostPlatform::Windows,
            label: "Windows",
            command: "scons platform=windows target=release_debug bits=64",
        },
        BuildHint {
            platform: HostPlatform::Linux,
            label: "Linux",
            command: "scons platform=linux target=release_debug bits=64",
        },
        BuildHint {
            platform: HostPlatform::MacOs,
            label: "macOS",
            command: "scons platform=osx target=release_debug arch=x86_64",
        },
    ]
}

/// Render the hints block; the entry for `host` is marked.
pub fn render_next_steps(build: &BuildConfig, host: HostPlatform) -> String {
    let mut out = String::from("You can now build the custom Godot engine:\n");

    for hint in build_hints() {
        let marker = if hint.platform == host {
            " (this host)"
        } else {
            ""
        };
        let _ = write!(out, "\n{}{}:\n    {}\n", hint.label, marker, hint.command);
    }

    out.push_str("\nAdd the following parameters to enable specific features:\n");
    for flag in build.features.iter().filter(|f| f.enabled) {
        let _ = writeln!(out, "    {:<18} # {}", flag.switch_arg(), flag.description);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hint_per_platform() {
        let hints = build_hints();
        assert_eq!(hints.len(), 3);
        assert!(hints.iter().all(|h| h.command.starts_with("scons platform=")));
    }

    #[test]
    fn test_render_marks_host_and_lists_switches() {
        let text = render_next_steps(&BuildConfig::default(), HostPlatform::Linux);
        assert!(text.contains("Linux (this host):"));
        assert!(!text.contains("Windows (this host)"));
        assert!(text.contains("scons platform=osx target=release_debug arch=x86_64"));
        assert!(text.contains("use_mono=yes"));
        assert!(text.contains("use_python=yes"));
        assert!(text.contains("use_uiverse=yes"));
    }

    #[test]
    fn test_render_on_unlisted_host_marks_nothing() {
        let text = render_next_steps(&BuildConfig::default(), HostPlatform::Other);
        assert!(!text.contains("(this host)"));
    }
}
