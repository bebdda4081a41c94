//! Progress reporting and summaries for the CLI

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use markerprep_core::pipeline::stage;
use markerprep_core::{PipelineStats, StageStats};
use markerprep_filters::language::LanguageShare;

/// Spinner that ticks while a stage runs and leaves one line per finished
/// stage behind.
pub struct ProgressReporter {
    bar: ProgressBar,
    start_time: Instant,
    previous: Option<StageStats>,
}

impl ProgressReporter {
    pub fn new() -> Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{elapsed_precise}] {msg}")?
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("loading");

        Ok(Self {
            bar,
            start_time: Instant::now(),
            previous: None,
        })
    }

    /// Reporter that draws nothing, for `--json` runs.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            start_time: Instant::now(),
            previous: None,
        }
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Record a finished stage.
    pub fn stage(&mut self, row: &StageStats) {
        let line = match &self.previous {
            Some(previous) => format!(
                "✓ {:<20} {:>10} edges ({:>8}) {:>9} followers ({:>8}) {:>7} markers",
                row.stage,
                format_number(row.edges),
                format_delta(previous.edges, row.edges),
                format_number(row.followers),
                format_delta(previous.followers, row.followers),
                format_number(row.markers),
            ),
            None => format!(
                "✓ {:<20} {:>10} edges {:>20} followers {:>19} markers",
                row.stage,
                format_number(row.edges),
                format_number(row.followers),
                format_number(row.markers),
            ),
        };
        self.bar.println(line);

        match next_stage(&row.stage) {
            Some(next) => self.bar.set_message(format!("running {}", next)),
            None => self.bar.set_message("writing outputs"),
        }
        self.previous = Some(row.clone());
    }

    /// Finish progress reporting
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

fn next_stage(current: &str) -> Option<&'static str> {
    let position = stage::ALL.iter().position(|s| *s == current)?;
    stage::ALL.get(position + 1).copied()
}

fn format_delta(before: usize, after: usize) -> String {
    if after >= before {
        format!("+{}", format_number(after - before))
    } else {
        format!("-{}", format_number(before - after))
    }
}

/// Format large numbers as K/M
pub fn format_number(n: usize) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Print a formatted summary report
pub fn print_summary_report(
    stats: &PipelineStats,
    outputs: Option<&[(&str, PathBuf)]>,
    elapsed: Duration,
) {
    println!("\n{}", "═".repeat(60));
    println!("Follower Filtering Complete");
    println!("{}", "═".repeat(60));

    println!("{:<22}{:>12}{:>12}{:>12}", "Stage", "Edges", "Followers", "Markers");
    println!("{}", "─".repeat(58));
    for row in &stats.stages {
        println!(
            "{:<22}{:>12}{:>12}{:>12}",
            row.stage,
            format_with_commas(row.edges),
            format_with_commas(row.followers),
            format_with_commas(row.markers)
        );
    }
    println!("{}", "─".repeat(58));

    if stats.duplicate_edges > 0 {
        println!("Duplicate edges:    {}", format_with_commas(stats.duplicate_edges));
    }
    if stats.duplicate_markers > 0 {
        println!("Duplicate markers:  {}", format_with_commas(stats.duplicate_markers));
    }
    println!(
        "Markers removed:    {} ({} pass{})",
        format_with_commas(stats.removed_markers),
        stats.convergence_passes_run,
        if stats.convergence_passes_run == 1 { "" } else { "es" }
    );
    if let Some(top) = stats.language_shares.first() {
        println!("Top language:       {} ({:.1}%)", top.code, top.percent);
    }
    println!(
        "Edges retained:     {:.1}%",
        stats.edge_retention_rate()
    );
    println!(
        "Followers retained: {:.1}%",
        stats.follower_retention_rate()
    );
    println!(
        "Graph components:   {} (largest {} nodes)",
        format_with_commas(stats.summary.components),
        format_with_commas(stats.summary.largest_component)
    );

    match outputs {
        Some(outputs) => {
            for (label, path) in outputs {
                println!("{:<20}{}", format!("{}:", label), path.display());
            }
        }
        None => println!("Output:             (dry run - no output written)"),
    }
    println!("Elapsed:            {:.2?}", elapsed);

    println!("{}", "═".repeat(60));
}

/// Print the language distribution of a followers file
pub fn print_language_report(total: usize, shares: &[LanguageShare]) {
    println!("\n{}", "═".repeat(40));
    println!("Languages of {} followers", format_with_commas(total));
    println!("{}", "═".repeat(40));
    for share in shares {
        println!(
            "{:<12}{:>14}{:>13.1}%",
            share.code,
            format_with_commas(share.count),
            share.percent
        );
    }
    println!("{}", "═".repeat(40));
}

/// Format number with thousand separators
pub fn format_with_commas(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42), "42");
        assert_eq!(format_number(1_234), "1.2K");
        assert_eq!(format_number(1_234_567), "1.2M");
    }

    #[test]
    fn test_format_with_commas() {
        assert_eq!(format_with_commas(1234), "1,234");
        assert_eq!(format_with_commas(1234567), "1,234,567");
        assert_eq!(format_with_commas(123456), "123,456");
        assert_eq!(format_with_commas(42), "42");
        assert_eq!(format_with_commas(0), "0");
    }

    #[test]
    fn test_format_delta() {
        assert_eq!(format_delta(10, 4), "-6");
        assert_eq!(format_delta(4, 4), "+0");
        assert_eq!(format_delta(1_000, 3_500), "+2.5K");
    }

    #[test]
    fn test_next_stage() {
        assert_eq!(next_stage(stage::INPUT), Some(stage::FOLLOWER_DEGREE));
        assert_eq!(next_stage(stage::FINAL_SYNC), None);
        assert_eq!(next_stage("unknown"), None);
    }

    #[test]
    fn test_hidden_reporter_tracks_previous_stage() {
        let mut reporter = ProgressReporter::hidden();
        let row = StageStats {
            stage: stage::INPUT.to_string(),
            edges: 10,
            followers: 5,
            markers: 2,
        };
        reporter.stage(&row);
        assert_eq!(reporter.previous.as_ref(), Some(&row));
        reporter.finish();
    }
}
