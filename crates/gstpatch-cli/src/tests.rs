use super::*;

use std::fs;
use std::io::Cursor;
use std::path::Path;

use clap::error::ErrorKind;
use clap::CommandFactory;
use gstpatch_core::{ColorChoice, GstPatchConfig, Installation, LayoutConfig, PatchError};
use gstpatch_patcher::{inspect_state, BatchSummary, Direction, InstallOutcome, Outcome, PatchState};
use tempfile::TempDir;

use crate::completion::write_completions_script;
use crate::dispatch::{
    load_config, run_interactive, run_list, run_status, run_targets, target_selection,
    EXIT_BATCH_FAILED, EXIT_OK,
};
use crate::preflight::{ensure_artifact_for, plans_apply, CapabilityProbe, FrameworkProbe};
use crate::prompt::prompt_selection;
use crate::render::{
    format_outcome_lines, format_summary_line, render_status_line, resolve_output_style,
    OutputStyle,
};
use crate::selection::{parse_selection, select_targets, Selection};

struct StubProbe {
    available: bool,
}

impl CapabilityProbe for StubProbe {
    fn check(&self) -> Result<(), PatchError> {
        if self.available {
            return Ok(());
        }
        Err(PatchError::CapabilityMissing {
            path: "/Library/Frameworks/GStreamer.framework".into(),
            hint: "install it".to_string(),
        })
    }
}

const PRESENT: StubProbe = StubProbe { available: true };
const ABSENT: StubProbe = StubProbe { available: false };

struct Host {
    dir: TempDir,
    config: GstPatchConfig,
}

impl Host {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let apps_root = dir.path().join("Applications");
        fs::create_dir_all(&apps_root).expect("must create apps root");
        let artifact = dir.path().join("winegstreamer.so");
        fs::write(&artifact, b"replacement").expect("must write artifact");

        let config = GstPatchConfig {
            apps_root,
            framework_dir: dir.path().join("GStreamer.framework"),
            artifact: Some(artifact),
            ..GstPatchConfig::default()
        };
        Self { dir, config }
    }

    fn bundle(&self, name: &str) -> Installation {
        let install = Installation::new(self.config.apps_root.join(name), &LayoutConfig::default());
        let lib64 = install.native_lib_dir();
        fs::create_dir_all(&lib64).expect("must create lib64");
        fs::write(lib64.join("libgstreamer-1.0.0.dylib"), b"bundled").expect("write");
        fs::write(lib64.join("libz.1.dylib"), b"unrelated").expect("write");
        fs::create_dir_all(install.wine_unix_dir()).expect("must create wine dir");
        fs::write(install.replaceable_binary_path(), b"stock").expect("write");
        install
    }

    fn broken_bundle(&self, name: &str) {
        fs::create_dir_all(self.config.apps_root.join(name).join("Contents"))
            .expect("must create bundle");
    }
}

fn output(buffer: Vec<u8>) -> String {
    String::from_utf8(buffer).expect("utf8 output")
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn target_commands_require_all_or_select() {
    let err = Cli::try_parse_from(["gstpatch", "toggle"]).expect_err("must require a target");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

    let err = Cli::try_parse_from(["gstpatch", "patch", "--all", "--select", "1"])
        .expect_err("must reject both");
    assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
}

#[test]
fn global_flags_parse_after_subcommand() {
    let cli = Cli::try_parse_from([
        "gstpatch",
        "restore",
        "--select",
        "1,2",
        "--plain",
        "--apps-root",
        "/tmp/apps",
    ])
    .expect("must parse");
    assert!(cli.plain);
    assert_eq!(cli.apps_root.as_deref(), Some(Path::new("/tmp/apps")));
    let Some(Commands::Restore(args)) = &cli.command else {
        panic!("expected restore command");
    };
    assert_eq!(
        target_selection(args).expect("must parse selection"),
        Selection::Indices(vec![1, 2])
    );
}

#[test]
fn no_subcommand_means_interactive() {
    let cli = Cli::try_parse_from(["gstpatch"]).expect("must parse");
    assert!(cli.command.is_none());
}

#[test]
fn cli_overrides_replace_config_values() {
    let host = Host::new();
    let config_path = host.dir.path().join("config.toml");
    fs::write(
        &config_path,
        "apps_root = \"/from/config\"\nframework_dir = \"/from/config/fw\"\n",
    )
    .expect("must write config");

    let cli = Cli::try_parse_from([
        "gstpatch",
        "--config",
        config_path.to_str().expect("utf8 path"),
        "--apps-root",
        "/from/flag",
        "status",
    ])
    .expect("must parse");
    let config = load_config(&cli).expect("must load config");
    assert_eq!(config.apps_root, Path::new("/from/flag"));
    assert_eq!(config.framework_dir, Path::new("/from/config/fw"));
    assert_eq!(config.artifact, None);
}

#[test]
fn parse_selection_accepts_keywords_and_lists() {
    assert_eq!(parse_selection("all\n").expect("all"), Selection::All);
    assert_eq!(parse_selection("A").expect("a"), Selection::All);
    assert_eq!(parse_selection(" none ").expect("none"), Selection::None);
    assert_eq!(parse_selection("q").expect("q"), Selection::None);
    assert_eq!(
        parse_selection("2, 1 2").expect("list"),
        Selection::Indices(vec![2, 1])
    );
}

#[test]
fn parse_selection_rejects_garbage() {
    assert!(parse_selection("").is_err());
    assert!(parse_selection("0").is_err());
    assert!(parse_selection("two").is_err());
    assert!(parse_selection("-1").is_err());
}

#[test]
fn select_targets_resolves_one_based_indices() {
    let layout = LayoutConfig::default();
    let installs = vec![
        Installation::new("/Applications/CrossOver.app", &layout),
        Installation::new("/Applications/CrossOver Preview.app", &layout),
    ];

    let picked = select_targets(&installs, &Selection::Indices(vec![2])).expect("must select");
    assert_eq!(picked, vec![installs[1].clone()]);
    assert_eq!(
        select_targets(&installs, &Selection::All).expect("all").len(),
        2
    );
    assert!(select_targets(&installs, &Selection::None)
        .expect("none")
        .is_empty());

    let err = select_targets(&installs, &Selection::Indices(vec![3])).expect_err("out of range");
    assert!(err.to_string().contains("out of range"));
}

#[test]
fn prompt_retries_until_answer_is_in_range() {
    let mut input = Cursor::new(b"7\nbogus\n2\n".to_vec());
    let mut out = Vec::new();

    let selection = prompt_selection(&mut input, &mut out, 2).expect("must prompt");

    assert_eq!(selection, Selection::Indices(vec![2]));
    let text = output(out);
    assert!(text.contains("Please pick numbers between 1 and 2."));
    assert!(text.contains("invalid selection 'bogus'"));
    assert_eq!(text.matches("Toggle which installation?").count(), 3);
}

#[test]
fn prompt_treats_end_of_input_as_none() {
    let mut input = Cursor::new(Vec::new());
    let mut out = Vec::new();
    assert_eq!(
        prompt_selection(&mut input, &mut out, 3).expect("must prompt"),
        Selection::None
    );
}

#[test]
fn output_style_resolution_honors_flag_config_and_terminal() {
    assert_eq!(
        resolve_output_style(true, ColorChoice::Always, false, true),
        OutputStyle::Plain
    );
    assert_eq!(
        resolve_output_style(false, ColorChoice::Always, true, false),
        OutputStyle::Rich
    );
    assert_eq!(
        resolve_output_style(false, ColorChoice::Never, false, true),
        OutputStyle::Plain
    );
    assert_eq!(
        resolve_output_style(false, ColorChoice::Auto, true, true),
        OutputStyle::Plain
    );
    assert_eq!(
        resolve_output_style(false, ColorChoice::Auto, false, false),
        OutputStyle::Plain
    );
    assert_eq!(
        resolve_output_style(false, ColorChoice::Auto, false, true),
        OutputStyle::Rich
    );
}

#[test]
fn status_lines_carry_badges_only_when_rich() {
    assert_eq!(render_status_line(OutputStyle::Plain, "ok", "done"), "done");
    assert_eq!(render_status_line(OutputStyle::Rich, "ok", "done"), "[OK] done");
    assert_eq!(render_status_line(OutputStyle::Rich, "err", "x"), "[ERR] x");
    assert_eq!(render_status_line(OutputStyle::Rich, "other", "x"), "[..] x");
}

#[test]
fn partial_failure_outcome_points_at_recovery() {
    let install = Installation::new("/Applications/CrossOver.app", &LayoutConfig::default());
    let outcome = InstallOutcome {
        installation: install.clone(),
        result: Err(PatchError::PartialMutationFailure {
            step: gstpatch_core::MutationStep::InstallArtifact,
            backup: install.backup_dir(),
            reason: "disk full".to_string(),
        }),
    };

    let lines = format_outcome_lines(&outcome, OutputStyle::Plain);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("CrossOver: failed (partial-mutation-failure):"));
    assert!(lines[0].contains("disk full"));
    assert!(lines[1].contains("gstpatch restore"));
}

#[test]
fn skipped_outcome_reports_current_state() {
    let outcome = InstallOutcome {
        installation: Installation::new("/Applications/CrossOver.app", &LayoutConfig::default()),
        result: Ok(Outcome::Skipped {
            state: PatchState::Patched,
        }),
    };
    assert_eq!(
        format_outcome_lines(&outcome, OutputStyle::Plain),
        vec!["CrossOver: already patched, skipped".to_string()]
    );
}

#[test]
fn summary_line_counts_each_result_kind() {
    let summary = BatchSummary {
        patched: 2,
        restored: 1,
        skipped: 0,
        failed: 1,
        needs_recovery: 0,
    };
    assert_eq!(
        format_summary_line(&summary, OutputStyle::Plain),
        "2 patched, 1 restored, 0 skipped, 1 failed"
    );
    assert!(format_summary_line(&summary, OutputStyle::Rich).starts_with("[ERR] "));
}

#[test]
fn framework_probe_requires_directory() {
    let host = Host::new();
    let probe = FrameworkProbe::new(&host.config.framework_dir);
    let err = probe.check().expect_err("framework is absent");
    assert!(matches!(err, PatchError::CapabilityMissing { .. }));
    assert_eq!(err.category(), gstpatch_core::ErrorCategory::PreconditionMissing);

    fs::create_dir_all(&host.config.framework_dir).expect("must create framework");
    probe.check().expect("framework is present");
}

#[test]
fn artifact_is_only_required_when_a_patch_is_planned() {
    let host = Host::new();
    let install = host.bundle("CrossOver.app");
    let missing = host.dir.path().join("missing.so");

    assert!(plans_apply(std::slice::from_ref(&install), Direction::Toggle));
    assert!(!plans_apply(std::slice::from_ref(&install), Direction::Restore));

    let err = ensure_artifact_for(std::slice::from_ref(&install), Direction::Apply, &missing)
        .expect_err("artifact is missing");
    assert!(matches!(err, PatchError::ArtifactMissing { .. }));
    ensure_artifact_for(std::slice::from_ref(&install), Direction::Restore, &missing)
        .expect("restore needs no artifact");
}

#[test]
fn toggle_batch_patches_then_restores() {
    let host = Host::new();
    let first = host.bundle("CrossOver.app");
    let second = host.bundle("CrossOver Preview.app");

    let mut out = Vec::new();
    let code = run_targets(
        &host.config,
        OutputStyle::Plain,
        &PRESENT,
        Direction::Toggle,
        &Selection::All,
        &mut out,
    )
    .expect("batch must run");
    assert_eq!(code, EXIT_OK);
    assert_eq!(inspect_state(&first), PatchState::Patched);
    assert_eq!(inspect_state(&second), PatchState::Patched);
    let text = output(out);
    assert!(text.contains("CrossOver: patched"));
    assert!(text.contains("CrossOver Preview: patched"));
    assert!(text.contains("2 patched, 0 restored, 0 skipped, 0 failed"));

    let mut out = Vec::new();
    let code = run_targets(
        &host.config,
        OutputStyle::Plain,
        &PRESENT,
        Direction::Toggle,
        &Selection::All,
        &mut out,
    )
    .expect("batch must run");
    assert_eq!(code, EXIT_OK);
    assert_eq!(inspect_state(&first), PatchState::Unpatched);
    assert_eq!(
        fs::read(first.replaceable_binary_path()).expect("binary"),
        b"stock"
    );
    assert!(output(out).contains("0 patched, 2 restored, 0 skipped, 0 failed"));
}

#[test]
fn failed_installation_sets_batch_exit_code() {
    let host = Host::new();
    let good = host.bundle("CrossOver.app");
    host.broken_bundle("CrossOver Broken.app");

    let mut out = Vec::new();
    let code = run_targets(
        &host.config,
        OutputStyle::Plain,
        &PRESENT,
        Direction::Apply,
        &Selection::All,
        &mut out,
    )
    .expect("batch must run");

    assert_eq!(code, EXIT_BATCH_FAILED);
    assert_eq!(inspect_state(&good), PatchState::Patched);
    let text = output(out);
    assert!(text.contains("CrossOver Broken: failed (invalid-installation-layout)"));
    assert!(text.contains("1 patched, 0 restored, 0 skipped, 1 failed"));
}

#[test]
fn missing_framework_aborts_before_discovery() {
    let host = Host::new();
    let install = host.bundle("CrossOver.app");

    let mut out = Vec::new();
    let err = run_targets(
        &host.config,
        OutputStyle::Plain,
        &ABSENT,
        Direction::Toggle,
        &Selection::All,
        &mut out,
    )
    .expect_err("must abort");

    assert!(matches!(
        err.downcast_ref::<PatchError>(),
        Some(PatchError::CapabilityMissing { .. })
    ));
    assert!(out.is_empty());
    assert_eq!(inspect_state(&install), PatchState::Unpatched);
}

#[test]
fn restore_runs_without_framework() {
    let host = Host::new();
    let install = host.bundle("CrossOver.app");
    run_targets(
        &host.config,
        OutputStyle::Plain,
        &PRESENT,
        Direction::Apply,
        &Selection::All,
        &mut Vec::new(),
    )
    .expect("must patch");

    let code = run_targets(
        &host.config,
        OutputStyle::Plain,
        &ABSENT,
        Direction::Restore,
        &Selection::All,
        &mut Vec::new(),
    )
    .expect("restore must run");
    assert_eq!(code, EXIT_OK);
    assert_eq!(inspect_state(&install), PatchState::Unpatched);
}

#[test]
fn empty_apps_root_is_fatal() {
    let host = Host::new();
    let err = run_list(&host.config, OutputStyle::Plain, false, &mut Vec::new())
        .expect_err("no installations");
    assert!(matches!(
        err.downcast_ref::<PatchError>(),
        Some(PatchError::NoInstallationsFound { .. })
    ));
}

#[test]
fn list_json_reports_state_and_backup() {
    let host = Host::new();
    host.bundle("CrossOver.app");

    let mut out = Vec::new();
    run_list(&host.config, OutputStyle::Plain, true, &mut out).expect("must list");

    let value: serde_json::Value = serde_json::from_slice(&out).expect("must be json");
    assert_eq!(value[0]["index"], 1);
    assert_eq!(value[0]["name"], "CrossOver");
    assert_eq!(value[0]["state"], "unpatched");
    assert_eq!(value[0]["backup_present"], false);
}

#[test]
fn interactive_run_toggles_the_chosen_installation() {
    let host = Host::new();
    let install = host.bundle("CrossOver.app");

    let mut input = Cursor::new(b"5\n1\n".to_vec());
    let mut out = Vec::new();
    let code = run_interactive(&host.config, OutputStyle::Plain, &PRESENT, &mut input, &mut out)
        .expect("must run");

    assert_eq!(code, EXIT_OK);
    assert_eq!(inspect_state(&install), PatchState::Patched);
    let text = output(out);
    assert!(text.contains("1) CrossOver [unpatched]"));
    assert!(text.contains("Please pick numbers between 1 and 1."));
    assert!(text.contains("CrossOver: patched"));
}

#[test]
fn interactive_none_changes_nothing() {
    let host = Host::new();
    let install = host.bundle("CrossOver.app");

    let mut input = Cursor::new(b"none\n".to_vec());
    let mut out = Vec::new();
    let code = run_interactive(&host.config, OutputStyle::Plain, &PRESENT, &mut input, &mut out)
        .expect("must run");

    assert_eq!(code, EXIT_OK);
    assert_eq!(inspect_state(&install), PatchState::Unpatched);
    assert!(output(out).contains("Nothing selected"));
}

#[test]
fn status_reports_markerless_backup_without_guessing_cause() {
    let host = Host::new();
    let install = host.bundle("CrossOver.app");
    fs::create_dir_all(install.backup_dir()).expect("must create backup");

    let mut out = Vec::new();
    run_status(&host.config, OutputStyle::Plain, &mut out).expect("must report status");
    let text = output(out);
    assert!(text.contains("backup present without marker"));
    assert!(!text.contains("interrupted"), "{text}");
}

#[test]
fn status_shows_marker_details_after_patch() {
    let host = Host::new();
    host.bundle("CrossOver.app");
    run_targets(
        &host.config,
        OutputStyle::Plain,
        &PRESENT,
        Direction::Apply,
        &Selection::All,
        &mut Vec::new(),
    )
    .expect("must patch");

    let mut out = Vec::new();
    run_status(&host.config, OutputStyle::Plain, &mut out).expect("must report status");
    let text = output(out);
    assert!(text.contains("[patched]"));
    assert!(text.contains("patched at: "));
    assert!(text.contains("artifact sha256: "));
    assert!(text.contains("backup: "));
}

#[test]
fn completions_mention_binary_name() {
    let mut out = Vec::new();
    write_completions_script(clap_complete::Shell::Bash, &mut out).expect("must generate");
    assert!(output(out).contains("gstpatch"));
}
