mod common;

use bootpkg::builder::drivers::{build_all, ArtifactNames, DriverEntry};
use bootpkg::DriverWarning;
use common::{config_at, touch, ScriptedRunner};

fn entry(pkg: &str, script: &str, artifact: &str) -> DriverEntry {
    DriverEntry {
        repo: Some(format!("https://example.com/{pkg}")),
        path: Some(pkg.to_string()),
        output: Some(format!("{pkg}/out")),
        artifacts: Some(ArtifactNames::One(artifact.to_string())),
        script: Some(script.to_string()),
        interpreter: Some("bash".to_string()),
    }
}

#[test]
fn test_incomplete_and_failing_drivers_do_not_stop_later_ones() {
    let dir = tempfile::tempdir().unwrap();
    let layout = config_at(dir.path()).layout().unwrap();
    touch(&dir.path().join("Good/out/Good.efi"));

    let incomplete = DriverEntry {
        interpreter: None,
        ..entry("Broken", "build.sh", "Broken.efi")
    };
    let entries = [
        incomplete,
        entry("Failing", "fail.sh", "Failing.efi"),
        entry("Good", "build.sh", "Good.efi"),
    ];
    let runner = ScriptedRunner::new().fail("bash fail.sh", 1);

    let outcomes = build_all(&runner, &entries, &layout, false);

    assert_eq!(outcomes.len(), 3);

    assert!(outcomes[0].skipped());
    assert!(matches!(
        &outcomes[0].warnings[0],
        DriverWarning::IncompleteSpec { missing, .. } if missing == &["interpreter"]
    ));

    assert!(!outcomes[1].built);
    assert!(matches!(
        outcomes[1].warnings[0],
        DriverWarning::BuildFailed { exit_code: 1, .. }
    ));

    assert!(outcomes[2].built);
    assert!(outcomes[2].warnings.is_empty());
    assert!(layout.legacy_drivers().join("Good.efi").exists());
    assert!(layout.uefi_drivers().join("Good.efi").exists());

    // The skipped entry never reached the runner.
    assert!(!runner.lines().iter().any(|l| l.contains("Broken")));
}

#[test]
fn test_driver_commands_run_in_checkout() {
    let dir = tempfile::tempdir().unwrap();
    let layout = config_at(dir.path()).layout().unwrap();
    let runner = ScriptedRunner::new();

    build_all(&runner, &[entry("Pkg", "macbuild.tool", "Pkg.efi")], &layout, false);

    let checkout = dir.path().join("Pkg");
    assert!(runner.ran("git clone https://example.com/Pkg"));
    for prefix in ["git pull", "chmod +x macbuild.tool", "bash macbuild.tool"] {
        let cmd = runner.find(prefix).unwrap();
        assert_eq!(cmd.dir.as_deref(), Some(checkout.as_path()), "{prefix}");
    }
}

#[test]
fn test_existing_checkout_is_not_cloned_and_pull_failure_is_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let layout = config_at(dir.path()).layout().unwrap();
    std::fs::create_dir_all(dir.path().join("Pkg/.git")).unwrap();
    touch(&dir.path().join("Pkg/out/Pkg.efi"));
    let runner = ScriptedRunner::new().fail("git pull", 1);

    let outcomes = build_all(&runner, &[entry("Pkg", "build.sh", "Pkg.efi")], &layout, false);

    assert!(!runner.ran("git clone"));
    assert!(outcomes[0].built);
    assert!(matches!(outcomes[0].warnings[0], DriverWarning::PullFailed { .. }));
    assert_eq!(outcomes[0].copied.len(), 2);
}

#[test]
fn test_clone_failure_skips_build() {
    let dir = tempfile::tempdir().unwrap();
    let layout = config_at(dir.path()).layout().unwrap();
    let runner = ScriptedRunner::new().fail("git clone", 128);

    let outcomes = build_all(&runner, &[entry("Pkg", "build.sh", "Pkg.efi")], &layout, false);

    assert!(matches!(
        outcomes[0].warnings[0],
        DriverWarning::CloneFailed { exit_code: 128, .. }
    ));
    assert!(!runner.ran("bash build.sh"));
}

#[test]
fn test_missing_artifact_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let layout = config_at(dir.path()).layout().unwrap();
    let runner = ScriptedRunner::new();

    let outcomes = build_all(&runner, &[entry("Pkg", "build.sh", "Pkg.efi")], &layout, false);

    assert!(outcomes[0].built);
    assert!(outcomes[0].copied.is_empty());
    assert_eq!(outcomes[0].warnings.len(), 2);
    assert!(outcomes[0]
        .warnings
        .iter()
        .all(|w| matches!(w, DriverWarning::CopyFailed { .. })));
}

#[test]
fn test_empty_driver_list() {
    let dir = tempfile::tempdir().unwrap();
    let layout = config_at(dir.path()).layout().unwrap();
    let runner = ScriptedRunner::new();

    assert!(build_all(&runner, &[], &layout, false).is_empty());
    assert!(runner.lines().is_empty());
}
