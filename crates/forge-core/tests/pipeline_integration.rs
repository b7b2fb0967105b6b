//! End-to-end pipeline runs against scratch workspaces.

use std::path::Path;
use std::process::Command as StdCommand;
use std::sync::{Arc, Mutex};

use forge_core::{
    BuildConfig, ErrorKind, ForgeConfig, Orchestrator, PipelineState, ValidationError,
};
use forge_host::fakes::{Reply, ScriptedRunner};
use forge_host::{hash_directory, CommandOutput, CommandRunner, CommandSpec, HostPlatform, SystemRunner};

/// Healthy Linux host; rules already on `runner` take precedence.
fn healthy_host(runner: ScriptedRunner) -> ScriptedRunner {
    runner
        .on("python3", &["--version"], Reply::ok("Python 3.10.12\n"))
        .on("python3", &["-m", "pip", "--version"], Reply::ok("pip 23.0.1\n"))
        .on("python3", &["-m", "pip", "show"], Reply::ok("Name: SCons\n"))
        .on("mono", &["--version"], Reply::ok("Mono JIT compiler version 6.12.0.200\n"))
        .on_with("git", &["clone"], Reply::ok(""), |spec| {
            std::fs::create_dir_all(&spec.args[2]).unwrap();
        })
        .on("git", &["checkout"], Reply::ok(""))
        .on("git", &["rev-parse", "HEAD"], Reply::ok("0123456789abcdef\n"))
        .on("git", &["status"], Reply::ok(""))
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Workspace with both module sources and a build configuration.
fn workspace(platform: HostPlatform) -> (tempfile::TempDir, ForgeConfig) {
    let ws = tempfile::tempdir().unwrap();
    write(
        &ws.path().join("modules/python/src/python_bridge.cpp"),
        "// python bridge\n",
    );
    write(&ws.path().join("modules/python/SCsub"), "Import('env')\n");
    write(
        &ws.path().join("modules/uiverse/src/uiverse_component.cpp"),
        "// uiverse\n",
    );
    write(&ws.path().join("modules/uiverse/SCsub"), "Import('env')\n");
    write(
        &ws.path().join("custom.py"),
        &BuildConfig::default().render_custom_py(),
    );

    let mut config = ForgeConfig::for_workspace(ws.path().to_path_buf());
    config.platform = platform;
    (ws, config)
}

#[test]
fn second_run_reuses_tree_and_drops_stale_files() {
    let (ws, config) = workspace(HostPlatform::Linux);
    let runner = Arc::new(healthy_host(ScriptedRunner::new()));
    let engine = ws.path().join("godot");

    let first = Orchestrator::new(config.clone(), runner.clone()).execute();
    assert!(first.succeeded(), "first run failed: {:?}", first.error);
    assert!(first.report.cloned);

    write(&engine.join("modules/python/stale.txt"), "left over");
    write(&ws.path().join("build/artifact.bin"), "binary");

    let second = Orchestrator::new(config, runner.clone()).execute();
    assert!(second.succeeded(), "second run failed: {:?}", second.error);
    assert!(!second.report.cloned);

    assert_eq!(runner.count("git", &["clone"]), 1);
    assert_eq!(runner.count("git", &["checkout", "3.x"]), 2);
    assert!(!engine.join("modules/python/stale.txt").exists());
    assert_eq!(
        std::fs::read_to_string(ws.path().join("build/artifact.bin")).unwrap(),
        "binary"
    );
    let digests = |run: &forge_core::PipelineRun| {
        run.report
            .modules
            .iter()
            .map(|m| (m.name.clone(), m.digest.clone(), m.replaced))
            .collect::<Vec<_>>()
    };
    let (first_digests, second_digests) = (digests(&first), digests(&second));
    assert!(first_digests.iter().all(|(_, _, replaced)| !replaced));
    assert!(second_digests.iter().all(|(_, _, replaced)| *replaced));
    for (a, b) in first_digests.iter().zip(&second_digests) {
        assert_eq!((&a.0, &a.1), (&b.0, &b.1));
    }
    for module in ["python", "uiverse"] {
        assert_eq!(
            hash_directory(&engine.join("modules").join(module)).unwrap(),
            hash_directory(&ws.path().join("modules").join(module)).unwrap(),
            "{module} is not an exact copy"
        );
    }
}

#[test]
fn missing_mono_stops_before_any_git_or_copy() {
    let (ws, config) = workspace(HostPlatform::Linux);
    let runner = Arc::new(healthy_host(
        ScriptedRunner::new().on("mono", &["--version"], Reply::NotFound),
    ));

    let run = Orchestrator::new(config, runner.clone()).execute();

    let err = run.error.expect("run should fail");
    assert_eq!(err.kind(), ErrorKind::ToolchainMissing);
    assert!(err
        .remediation()
        .unwrap()
        .contains("apt-get install mono-complete"));
    assert_eq!(runner.count("git", &[]), 0);
    assert!(!ws.path().join("godot").exists());
    assert!(!ws.path().join("build").exists());
    assert_eq!(
        run.report.states,
        vec![PipelineState::Validating, PipelineState::Failed]
    );
}

#[test]
fn windows_reports_missing_msbuild_before_remote_operations() {
    let (ws, config) = workspace(HostPlatform::Windows);
    let runner = Arc::new(
        ScriptedRunner::new()
            .with_executable("mono")
            .on("python", &["--version"], Reply::ok("Python 3.11.4\n"))
            .on("python", &["-m", "pip", "--version"], Reply::ok("pip 23.1\n"))
            .on("python", &["-m", "pip", "show"], Reply::ok("Name: wheel\n")),
    );

    let run = Orchestrator::new(config, runner.clone()).execute();

    match run.error {
        Some(forge_core::PipelineError::Validation(ValidationError::ToolchainMissing {
            platform,
            missing,
        })) => {
            assert_eq!(platform, HostPlatform::Windows);
            assert_eq!(missing, vec!["msbuild"]);
        }
        other => panic!("expected a missing toolchain, got {other:?}"),
    }
    assert_eq!(runner.count("git", &[]), 0);
    assert!(!ws.path().join("godot").exists());
}

#[test]
fn missing_package_is_installed_and_rechecked() {
    let (_ws, config) = workspace(HostPlatform::Linux);
    let runner = Arc::new(healthy_host(
        ScriptedRunner::new()
            .on_sequence(
                "python3",
                &["-m", "pip", "show", "wheel"],
                vec![Reply::fail(1, "WARNING: Package(s) not found: wheel"), Reply::ok("Name: wheel\n")],
            )
            .on("python3", &["-m", "pip", "install", "wheel"], Reply::ok("Successfully installed wheel\n")),
    ));

    let run = Orchestrator::new(config, runner.clone()).execute();
    assert!(run.succeeded(), "{:?}", run.error);
    assert_eq!(run.report.installed_packages, vec!["wheel"]);
    assert_eq!(runner.count("python3", &["-m", "pip", "show", "wheel"]), 2);
    assert_eq!(runner.count("python3", &["-m", "pip", "install"]), 1);
}

/// Real git for `git`, scripted replies for everything else.
struct GitBackedRunner {
    host: ScriptedRunner,
    git_calls: Mutex<Vec<CommandSpec>>,
}

impl CommandRunner for GitBackedRunner {
    fn run(&self, spec: &CommandSpec) -> forge_host::Result<CommandOutput> {
        if spec.program == "git" {
            self.git_calls.lock().unwrap().push(spec.clone());
            return SystemRunner::new().run(spec);
        }
        self.host.run(spec)
    }

    fn locate(&self, program: &str) -> Option<std::path::PathBuf> {
        self.host.locate(program)
    }
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Local stand-in for the upstream remote with `main` and `3.x` branches.
fn upstream_origin() -> tempfile::TempDir {
    let origin = tempfile::tempdir().unwrap();
    git(origin.path(), &["init", "-b", "main"]);
    git(origin.path(), &["config", "user.name", "test-user"]);
    git(origin.path(), &["config", "user.email", "test@example.com"]);
    write(&origin.path().join("SConstruct"), "# godot\n");
    git(origin.path(), &["add", "SConstruct"]);
    git(origin.path(), &["commit", "-m", "initial"]);
    git(origin.path(), &["branch", "3.x"]);
    origin
}

#[test]
fn existing_tree_on_wrong_branch_converges_without_clone() {
    let origin = upstream_origin();
    let (ws, mut config) = workspace(HostPlatform::Linux);
    config.upstream.url = origin.path().display().to_string();

    let engine = ws.path().join("godot");
    git(
        ws.path(),
        &["clone", &origin.path().display().to_string(), "godot"],
    );
    assert_eq!(git(&engine, &["rev-parse", "--abbrev-ref", "HEAD"]), "main");

    let runner = Arc::new(GitBackedRunner {
        host: healthy_host(ScriptedRunner::new()),
        git_calls: Mutex::new(Vec::new()),
    });
    let run = Orchestrator::new(config, runner.clone()).execute();

    assert!(run.succeeded(), "{:?}", run.error);
    assert!(!run.report.cloned);
    assert_eq!(git(&engine, &["rev-parse", "--abbrev-ref", "HEAD"]), "3.x");
    assert_eq!(run.report.upstream_head.as_ref().map(String::len), Some(40));

    let calls = runner.git_calls.lock().unwrap();
    assert!(calls.iter().all(|c| !c.matches("git", &["clone"])));
    assert!(calls
        .iter()
        .any(|c| c.matches("git", &["checkout", "3.x"]) && c.cwd.as_deref() == Some(engine.as_path())));
    // integrated modules are untracked and must not count as local changes
    assert!(git(&engine, &["status", "--porcelain", "--untracked-files=no"]).is_empty());
}

#[test]
fn fresh_clone_from_local_origin() {
    let origin = upstream_origin();
    let (ws, mut config) = workspace(HostPlatform::Linux);
    config.upstream.url = origin.path().display().to_string();

    let runner = Arc::new(GitBackedRunner {
        host: healthy_host(ScriptedRunner::new()),
        git_calls: Mutex::new(Vec::new()),
    });
    let run = Orchestrator::new(config, runner).execute();

    assert!(run.succeeded(), "{:?}", run.error);
    assert!(run.report.cloned);
    let engine = ws.path().join("godot");
    assert_eq!(git(&engine, &["rev-parse", "--abbrev-ref", "HEAD"]), "3.x");
    assert!(engine.join("modules/uiverse/src/uiverse_component.cpp").is_file());
    assert!(engine.join("custom.py").is_file());
}
