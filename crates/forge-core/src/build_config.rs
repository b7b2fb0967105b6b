//! Declared build configuration surface.
//!
//! Static data only: which optional features exist, the switches that turn
//! them on for SCons, the documentation classes the modules register and a
//! few values passed through to the engine build untouched.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// An optional engine feature toggled on the SCons command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag {
    /// Environment key set in the build configuration, e.g. `module_mono_enabled`.
    pub name: String,

    /// Command-line switch, e.g. `use_mono`.
    pub switch: String,

    pub description: String,

    pub enabled: bool,
}

impl FeatureFlag {
    fn on(name: &str, switch: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            switch: switch.to_string(),
            description: description.to_string(),
            enabled: true,
        }
    }

    /// `use_mono=yes` / `use_mono=no`.
    pub fn switch_arg(&self) -> String {
        format!("{}={}", self.switch, yes_no(self.enabled))
    }
}

/// Engine build configuration, rendered as `custom.py`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    pub features: Vec<FeatureFlag>,

    /// Classes documented by the custom modules.
    pub doc_classes: Vec<String>,

    pub doc_path: String,

    /// Extra `env[...]` assignments, in order. Not interpreted here.
    pub settings: Vec<(String, String)>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let settings = [
            // C#
            ("mono_static", "no"),
            ("tools_enabled", "yes"),
            ("module_mono_config_file", "modules/mono/config.py"),
            // Python
            ("python_version", "3.8"),
            ("python_lib", "python3"),
            ("python_include", ""),
            // Uiverse.io
            ("uiverse_api_url", "https://uiverse.io/api"),
            ("uiverse_cache_dir", "user://uiverse_cache"),
        ];

        BuildConfig {
            features: vec![
                FeatureFlag::on("module_mono_enabled", "use_mono", "C# scripting via Mono"),
                FeatureFlag::on(
                    "module_python_enabled",
                    "use_python",
                    "embedded Python scripting bridge",
                ),
                FeatureFlag::on(
                    "module_uiverse_enabled",
                    "use_uiverse",
                    "Uiverse.io UI components",
                ),
            ],
            doc_classes: vec!["PythonBridge".to_string(), "UiverseComponent".to_string()],
            doc_path: "doc_classes".to_string(),
            settings: settings
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl BuildConfig {
    /// Look up a pass-through setting.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Switches for every enabled feature, in declaration order.
    pub fn feature_switches(&self) -> Vec<String> {
        self.features
            .iter()
            .filter(|f| f.enabled)
            .map(FeatureFlag::switch_arg)
            .collect()
    }

    /// Render the SCons custom build file.
    pub fn render_custom_py(&self) -> String {
        let mut out = String::new();
        out.push_str("#!/usr/bin/env python\n\n");
        out.push_str("# Generated by engine-forge. Copied verbatim into the engine tree.\n\n");
        out.push_str("def can_build(env, platform):\n    return True\n\n");
        out.push_str("def configure(env):\n");
        for flag in &self.features {
            let _ = writeln!(out, "    env['{}'] = '{}'", flag.name, yes_no(flag.enabled));
        }
        for (key, value) in &self.settings {
            let _ = writeln!(out, "    env['{}'] = '{}'", key, value.replace('\'', "\\'"));
        }
        out.push_str("\ndef get_doc_classes():\n    return [\n");
        for class in &self.doc_classes {
            let _ = writeln!(out, "        \"{}\",", class);
        }
        out.push_str("    ]\n\n");
        let _ = write!(
            out,
            "def get_doc_path():\n    return \"{}\"\n",
            self.doc_path
        );
        out
    }
}

fn yes_no(enabled: bool) -> &'static str {
    if enabled {
        "yes"
    } else {
        "no"
    }
}
