use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use gstpatch_core::{ColorChoice, Installation, PatchError};
use gstpatch_patcher::{BatchSummary, InstallOutcome, Outcome, PatchState};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn resolve_output_style(
    plain_flag: bool,
    color: ColorChoice,
    no_color_env: bool,
    stdout_is_terminal: bool,
) -> OutputStyle {
    if plain_flag {
        return OutputStyle::Plain;
    }
    match color {
        ColorChoice::Always => OutputStyle::Rich,
        ColorChoice::Never => OutputStyle::Plain,
        ColorChoice::Auto if no_color_env || !stdout_is_terminal => OutputStyle::Plain,
        ColorChoice::Auto => OutputStyle::Rich,
    }
}

pub(crate) fn current_output_style(plain_flag: bool, color: ColorChoice) -> OutputStyle {
    let no_color_env = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    resolve_output_style(
        plain_flag,
        color,
        no_color_env,
        std::io::stdout().is_terminal(),
    )
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        "step" => "[STEP]",
        _ => "[..]",
    }
}

pub(crate) fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(colorize(section_style(), &format!("== {title} =="))),
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn state_style(state: PatchState) -> Style {
    let color = match state {
        PatchState::Patched => AnsiColor::BrightGreen,
        PatchState::Unpatched => AnsiColor::BrightYellow,
    };
    Style::new().fg_color(Some(color.into()))
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub(crate) fn format_installation_lines(
    entries: &[(Installation, PatchState)],
    style: OutputStyle,
) -> Vec<String> {
    entries
        .iter()
        .enumerate()
        .map(|(index, (install, state))| {
            let state_label = match style {
                OutputStyle::Plain => state.to_string(),
                OutputStyle::Rich => colorize(state_style(*state), state.as_str()),
            };
            format!(
                "{}) {} [{}] {}",
                index + 1,
                install.display_name(),
                state_label,
                install.root().display()
            )
        })
        .collect()
}

pub(crate) fn format_outcome_lines(outcome: &InstallOutcome, style: OutputStyle) -> Vec<String> {
    let name = outcome.installation.display_name();
    match &outcome.result {
        Ok(Outcome::Patched { removed, backup }) => vec![render_status_line(
            style,
            "ok",
            &format!(
                "{name}: patched (removed {removed} bundled entries, backup: {})",
                backup.display()
            ),
        )],
        Ok(Outcome::Restored {
            restored,
            backup_removed,
        }) => {
            let mut lines = vec![render_status_line(
                style,
                "ok",
                &format!("{name}: restored {restored} entries"),
            )];
            if !backup_removed {
                lines.push(render_status_line(
                    style,
                    "warn",
                    &format!(
                        "{name}: backup could not be removed: {}",
                        outcome.installation.backup_dir().display()
                    ),
                ));
            }
            lines
        }
        Ok(Outcome::Skipped { state }) => vec![render_status_line(
            style,
            "info",
            &format!("{name}: already {state}, skipped"),
        )],
        Err(err) => format_failure_lines(name, err, style),
    }
}

fn format_failure_lines(name: &str, err: &PatchError, style: OutputStyle) -> Vec<String> {
    let mut lines = vec![render_status_line(
        style,
        "err",
        &format!("{name}: failed ({}): {err}", err.category().as_str()),
    )];
    if err.needs_manual_recovery() {
        lines.push(render_status_line(
            style,
            "warn",
            &format!("{name}: run `gstpatch restore` and select this installation to recover"),
        ));
    }
    lines
}

pub(crate) fn format_summary_line(summary: &BatchSummary, style: OutputStyle) -> String {
    let message = format!(
        "{} patched, {} restored, {} skipped, {} failed",
        summary.patched, summary.restored, summary.skipped, summary.failed
    );
    let status = if summary.all_succeeded() { "ok" } else { "err" };
    render_status_line(style, status, &message)
}

/// Batch progress shown on the terminal in rich mode only.
pub(crate) struct BatchProgress {
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl BatchProgress {
    pub(crate) fn start(style: OutputStyle, label: &str, total: u64) -> Self {
        let progress_bar = if style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new(total.max(1));
            if let Ok(template) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<24} [{bar:20.cyan/blue}] {pos:>2}/{len:2}",
            ) {
                progress_bar.set_style(template.progress_chars("=>-"));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        Self {
            progress_bar,
            started_at: Instant::now(),
        }
    }

    pub(crate) fn set_message(&self, message: &str) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.set_message(message.to_string());
        }
    }

    /// Runs `f` with the bar hidden so output written meanwhile does not tear it.
    pub(crate) fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.progress_bar {
            Some(progress_bar) => progress_bar.suspend(f),
            None => f(),
        }
    }

    pub(crate) fn advance(&self) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.inc(1);
        }
    }

    pub(crate) fn finish(mut self) -> Duration {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
        self.started_at.elapsed()
    }
}

pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}
