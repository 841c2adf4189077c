use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use gstpatch_core::{require_installations, GstPatchConfig, Installation, PatchError};
use gstpatch_patcher::{
    inspect_state, read_marker, BatchEvent, BatchSummary, Direction, InstallOutcome,
    PatchController, PatchState,
};
use serde::Serialize;

use crate::completion::write_completions_script;
use crate::preflight::{ensure_artifact_for, resolve_artifact_path, CapabilityProbe, FrameworkProbe};
use crate::prompt::prompt_selection;
use crate::render::{
    current_output_style, format_elapsed, format_installation_lines, format_outcome_lines,
    format_summary_line, render_section_header, render_status_line, BatchProgress, OutputStyle,
};
use crate::selection::{parse_selection, select_targets, Selection};
use crate::{Cli, Commands, TargetArgs};

pub(crate) const EXIT_OK: u8 = 0;
pub(crate) const EXIT_BATCH_FAILED: u8 = 1;
pub(crate) const EXIT_FATAL: u8 = 2;

pub(crate) fn run_cli(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    let style = current_output_style(cli.plain, config.color);
    let probe = FrameworkProbe::new(&config.framework_dir);
    let mut stdout = io::stdout().lock();

    let code = match cli.command {
        None => {
            let mut stdin = io::stdin().lock();
            run_interactive(&config, style, &probe, &mut stdin, &mut stdout)?
        }
        Some(Commands::List { json }) => run_list(&config, style, json, &mut stdout)?,
        Some(Commands::Toggle(args)) => {
            let selection = target_selection(&args)?;
            run_targets(&config, style, &probe, Direction::Toggle, &selection, &mut stdout)?
        }
        Some(Commands::Patch(args)) => {
            let selection = target_selection(&args)?;
            run_targets(&config, style, &probe, Direction::Apply, &selection, &mut stdout)?
        }
        Some(Commands::Restore(args)) => {
            let selection = target_selection(&args)?;
            run_targets(&config, style, &probe, Direction::Restore, &selection, &mut stdout)?
        }
        Some(Commands::Status) => run_status(&config, style, &mut stdout)?,
        Some(Commands::Completions { shell }) => {
            write_completions_script(shell, &mut stdout)?;
            EXIT_OK
        }
    };

    Ok(code.into())
}

pub(crate) fn load_config(cli: &Cli) -> Result<GstPatchConfig> {
    let mut config = GstPatchConfig::load_or_default(cli.config.as_deref())?;
    if let Some(apps_root) = &cli.apps_root {
        config.apps_root = apps_root.clone();
    }
    if let Some(artifact) = &cli.artifact {
        config.artifact = Some(artifact.clone());
    }
    if let Some(framework_dir) = &cli.framework_dir {
        config.framework_dir = framework_dir.clone();
    }
    tracing::debug!(
        apps_root = %config.apps_root.display(),
        framework_dir = %config.framework_dir.display(),
        "resolved configuration"
    );
    Ok(config)
}

pub(crate) fn target_selection(args: &TargetArgs) -> Result<Selection> {
    if args.all {
        return Ok(Selection::All);
    }
    match &args.select {
        Some(choice) => parse_selection(choice),
        None => Ok(Selection::None),
    }
}

fn discover(config: &GstPatchConfig) -> Result<Vec<Installation>, PatchError> {
    require_installations(
        &config.apps_root,
        &config.layout.bundle_matcher(),
        &config.layout,
    )
}

fn with_states(installs: &[Installation]) -> Vec<(Installation, PatchState)> {
    installs
        .iter()
        .map(|install| (install.clone(), inspect_state(install)))
        .collect()
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Toggle => "toggle",
        Direction::Apply => "patch",
        Direction::Restore => "restore",
    }
}

#[derive(Serialize)]
struct InstallationView<'a> {
    index: usize,
    name: &'a str,
    root: String,
    state: &'static str,
    backup_present: bool,
}

pub(crate) fn run_list<W: Write>(
    config: &GstPatchConfig,
    style: OutputStyle,
    json: bool,
    out: &mut W,
) -> Result<u8> {
    let installs = discover(config)?;
    let entries = with_states(&installs);

    if json {
        let views = entries
            .iter()
            .enumerate()
            .map(|(index, (install, state))| InstallationView {
                index: index + 1,
                name: install.display_name(),
                root: install.root().display().to_string(),
                state: state.as_str(),
                backup_present: install.backup_dir().is_dir(),
            })
            .collect::<Vec<_>>();
        let rendered =
            serde_json::to_string_pretty(&views).context("failed to render installation list")?;
        writeln!(out, "{rendered}").context("failed writing installation list")?;
        return Ok(EXIT_OK);
    }

    if let Some(header) = render_section_header(style, "Installations") {
        writeln!(out, "{header}").context("failed writing installation list")?;
    }
    for line in format_installation_lines(&entries, style) {
        writeln!(out, "{line}").context("failed writing installation list")?;
    }
    Ok(EXIT_OK)
}

pub(crate) fn run_interactive<R: BufRead, W: Write>(
    config: &GstPatchConfig,
    style: OutputStyle,
    probe: &dyn CapabilityProbe,
    input: &mut R,
    out: &mut W,
) -> Result<u8> {
    probe.check()?;
    let installs = discover(config)?;

    if let Some(header) = render_section_header(style, "Installations") {
        writeln!(out, "{header}").context("failed writing installation list")?;
    }
    for line in format_installation_lines(&with_states(&installs), style) {
        writeln!(out, "{line}").context("failed writing installation list")?;
    }

    let selection = prompt_selection(input, out, installs.len())?;
    execute_selection(config, style, Direction::Toggle, &installs, &selection, out)
}

pub(crate) fn run_targets<W: Write>(
    config: &GstPatchConfig,
    style: OutputStyle,
    probe: &dyn CapabilityProbe,
    direction: Direction,
    selection: &Selection,
    out: &mut W,
) -> Result<u8> {
    // restoring stays possible after the framework was removed from the host
    if direction != Direction::Restore {
        probe.check()?;
    }
    let installs = discover(config)?;
    execute_selection(config, style, direction, &installs, selection, out)
}

fn execute_selection<W: Write>(
    config: &GstPatchConfig,
    style: OutputStyle,
    direction: Direction,
    installs: &[Installation],
    selection: &Selection,
    out: &mut W,
) -> Result<u8> {
    let targets = select_targets(installs, selection)?;
    if targets.is_empty() {
        writeln!(
            out,
            "{}",
            render_status_line(style, "info", "Nothing selected")
        )
        .context("failed writing output")?;
        return Ok(EXIT_OK);
    }

    let artifact = resolve_artifact_path(config)?;
    ensure_artifact_for(&targets, direction, &artifact)?;
    let controller = PatchController::from_config(config, artifact);
    let summary = run_batch(&controller, &targets, direction, style, out)?;

    Ok(if summary.all_succeeded() {
        EXIT_OK
    } else {
        EXIT_BATCH_FAILED
    })
}

fn run_batch<W: Write>(
    controller: &PatchController,
    targets: &[Installation],
    direction: Direction,
    style: OutputStyle,
    out: &mut W,
) -> Result<BatchSummary> {
    let label = direction_label(direction);
    if let Some(header) = render_section_header(style, label) {
        writeln!(out, "{header}").context("failed writing output")?;
    }

    let progress = BatchProgress::start(style, label, targets.len() as u64);
    let mut write_error = None;
    let outcomes = controller.process_all_with_observer(targets, direction, |event| match event {
        BatchEvent::Started { installation, .. } => {
            progress.set_message(installation.display_name());
        }
        BatchEvent::Finished {
            installation,
            result,
            ..
        } => {
            progress.advance();
            let outcome = InstallOutcome {
                installation: installation.clone(),
                result: result.clone(),
            };
            let lines = format_outcome_lines(&outcome, style);
            progress.suspend(|| {
                for line in lines {
                    if let Err(err) = writeln!(out, "{line}") {
                        write_error.get_or_insert(err);
                    }
                }
            });
        }
    });
    let elapsed = progress.finish();
    if let Some(err) = write_error {
        return Err(err).context("failed writing output");
    }

    let summary = BatchSummary::from_outcomes(&outcomes);
    let mut line = format_summary_line(&summary, style);
    if style == OutputStyle::Rich {
        line.push_str(&format!(" in {}", format_elapsed(elapsed)));
    }
    writeln!(out, "{line}").context("failed writing output")?;
    Ok(summary)
}

pub(crate) fn run_status<W: Write>(
    config: &GstPatchConfig,
    style: OutputStyle,
    out: &mut W,
) -> Result<u8> {
    let installs = discover(config)?;
    for (index, (install, state)) in with_states(&installs).into_iter().enumerate() {
        let mut lines = vec![format!(
            "{}) {} [{}] {}",
            index + 1,
            install.display_name(),
            state,
            install.root().display()
        )];
        let backup_present = install.backup_dir().is_dir();

        match read_marker(&install) {
            Ok(Some(marker)) => {
                if let Some(patched_at) = marker.patched_at {
                    lines.push(format!("   patched at: {patched_at}"));
                }
                if let Some(artifact) = marker.artifact {
                    lines.push(format!("   artifact: {artifact}"));
                }
                if let Some(sha256) = marker.artifact_sha256 {
                    lines.push(format!("   artifact sha256: {sha256}"));
                }
                if let Some(count) = marker.backup_entries {
                    lines.push(format!("   backed-up entries: {count}"));
                }
            }
            Ok(None) => {}
            Err(err) => lines.push(render_status_line(
                style,
                "warn",
                &format!("   marker unreadable: {err:#}"),
            )),
        }

        match (state, backup_present) {
            (PatchState::Patched, false) => lines.push(render_status_line(
                style,
                "warn",
                "   marker present but no backup found; restore is not possible",
            )),
            (PatchState::Unpatched, true) => lines.push(render_status_line(
                style,
                "warn",
                "   backup present without marker; `gstpatch restore` puts it back, `gstpatch patch` reuses it",
            )),
            (_, true) => lines.push(format!("   backup: {}", install.backup_dir().display())),
            _ => {}
        }

        for line in lines {
            writeln!(out, "{line}").context("failed writing status")?;
        }
    }
    Ok(EXIT_OK)
}
