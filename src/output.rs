//! Output formatting and styling module.
//!
//! All operator-facing text goes through [`OutputFormatter`] so symbols and colours
//! stay consistent between one-shot runs, watch mode and undo. Diagnostics meant for
//! debugging go through `tracing` instead.

use crate::context::RunContext;
use crate::file_organizer::MoveOutcome;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    pub fn notification(title: &str, message: &str) {
        println!("{} {}: {}", "🔔".normal(), title.bold(), message);
    }

    /// Prints one line describing what happened to a file.
    pub fn outcome(outcome: &MoveOutcome, context: &RunContext) {
        let shown = |path: &Path| context.relative(path).display().to_string();
        let prefix = if context.dry_run { "[DRY RUN] " } else { "" };
        match outcome {
            MoveOutcome::Moved {
                source,
                destination,
            } => Self::success(&format!(
                "{}{} → {}",
                prefix,
                shown(source),
                shown(destination)
            )),
            MoveOutcome::SkippedDuplicateSameContent { source, existing } => Self::info(&format!(
                "{}= {} is identical to {}, left in place",
                prefix,
                shown(source),
                shown(existing)
            )),
            MoveOutcome::SkippedNameCollisionDifferentContent { source, existing } => {
                Self::warning(&format!(
                    "{}{} not moved: a different file already exists at {}",
                    prefix,
                    shown(source),
                    shown(existing)
                ))
            }
            MoveOutcome::DeletedDuplicate { source, existing } => Self::warning(&format!(
                "{}Deleted {} (duplicate of {})",
                prefix,
                shown(source),
                shown(existing)
            )),
            MoveOutcome::DeletedAged { path } => {
                Self::warning(&format!("{}Deleted old file {}", prefix, shown(path)))
            }
            MoveOutcome::Failed { source, reason } => {
                Self::error(&format!("{}{}: {}", prefix, shown(source), reason))
            }
        }
    }

    /// Creates and returns a progress bar for file operations.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    /// Prints a table of moved files per category plus the other outcome counts.
    pub fn summary_table(outcomes: &[MoveOutcome], context: &RunContext) {
        Self::header("SUMMARY");

        let mut per_category: BTreeMap<String, usize> = BTreeMap::new();
        for outcome in outcomes {
            if let MoveOutcome::Moved { destination, .. } = outcome
                && let Some(category) = context
                    .relative(destination)
                    .components()
                    .next()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
            {
                *per_category.entry(category).or_insert(0) += 1;
            }
        }

        let max_category_len = per_category
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));
        for (category, count) in &per_category {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count),
                width = max_category_len
            );
        }
        println!("{}", "-".repeat(max_category_len + 10));

        let moved: usize = per_category.values().sum();
        println!(
            "{:<width$} | {} {}",
            "Moved".bold(),
            moved.to_string().green().bold(),
            plural(moved),
            width = max_category_len
        );

        let count = |pred: fn(&MoveOutcome) -> bool| outcomes.iter().filter(|o| pred(o)).count();
        let rows = [
            (
                "Duplicates skipped",
                count(|o| matches!(o, MoveOutcome::SkippedDuplicateSameContent { .. })),
            ),
            (
                "Duplicates deleted",
                count(|o| matches!(o, MoveOutcome::DeletedDuplicate { .. })),
            ),
            (
                "Name collisions",
                count(|o| matches!(o, MoveOutcome::SkippedNameCollisionDifferentContent { .. })),
            ),
            (
                "Old files deleted",
                count(|o| matches!(o, MoveOutcome::DeletedAged { .. })),
            ),
            ("Failed", count(|o| matches!(o, MoveOutcome::Failed { .. }))),
        ];
        for (label, n) in rows {
            if n > 0 {
                println!("{:<width$} | {}", label, n, width = max_category_len);
            }
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
