pub mod types;

pub use types::{PullRequestMetrics, RepositoryMetrics, RepositoryReport};

use crate::analysis::stats::{median, population_variance};
use crate::store::MetricSnapshot;
use chrono::TimeDelta;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

/// How many of the lowest-scoring PRs a report lists.
const LOWEST_SCORING_SHOWN: usize = 5;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Roll every PR's metrics up into repository-level medians and variances.
///
/// A PR number seen twice keeps its last metrics.
pub fn build(pull_requests: impl IntoIterator<Item = PullRequestMetrics>) -> RepositoryMetrics {
    let pull_requests: BTreeMap<u64, PullRequestMetrics> =
        pull_requests.into_iter().map(|m| (m.number, m)).collect();

    let comment_counts: Vec<i64> = pull_requests.values().map(|m| m.comment_count).collect();
    let word_counts: Vec<i64> = pull_requests.values().map(|m| m.comment_word_count).collect();
    let words_per_comment: Vec<i64> = pull_requests.values().map(|m| m.median_words_per_comment).collect();
    let open_for: Vec<TimeDelta> = pull_requests.values().map(|m| m.open_for()).collect();
    let business_days: Vec<i64> = pull_requests.values().map(|m| m.business_days_open).collect();

    let as_f64 = |values: &[i64]| values.iter().map(|&v| v as f64).collect::<Vec<_>>();
    let comment_count_variance = population_variance(&as_f64(&comment_counts));
    let comment_word_count_variance = population_variance(&as_f64(&word_counts));

    RepositoryMetrics {
        median_comment_count: median(&comment_counts),
        median_comment_word_count: median(&word_counts),
        median_words_per_comment: median(&words_per_comment),
        comment_count_variance,
        comment_count_std_dev: comment_count_variance.sqrt(),
        comment_word_count_variance,
        comment_word_count_std_dev: comment_word_count_variance.sqrt(),
        median_seconds_to_closure: round_to_seconds(median(&open_for)),
        median_business_days_to_closure: median(&business_days),
        pull_requests,
    }
}

/// Whole seconds, halves rounded away from zero.
fn round_to_seconds(delta: TimeDelta) -> i64 {
    let millis = delta.num_milliseconds();
    (millis + millis.signum() * 500) / 1_000
}

/// Output the reports to terminal (default) or to a markdown file.
#[instrument(skip(reports), fields(repositories = reports.len()))]
pub fn output(reports: &[RepositoryReport], output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            for report in reports {
                print_terminal_report(report);
            }
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(reports, path)
        }
    }
}

/// `vs 2024-03-03: comments/PR +1, words/PR -5, business days to close +0`
fn trend_line(current: &RepositoryMetrics, previous: &MetricSnapshot) -> String {
    let before = &previous.metrics;
    format!(
        "vs {}: comments/PR {:+}, words/PR {:+}, business days to close {:+}",
        previous.date,
        current.median_comment_count - before.median_comment_count,
        current.median_comment_word_count - before.median_comment_word_count,
        current.median_business_days_to_closure - before.median_business_days_to_closure
    )
}

/// `1d 4h 5m` style rendering of a second count.
fn format_seconds(seconds: i64) -> String {
    let (days, rest) = (seconds / 86_400, seconds % 86_400);
    let (hours, minutes) = (rest / 3_600, (rest % 3_600) / 60);
    match (days, hours) {
        (0, 0) => format!("{}m", minutes),
        (0, _) => format!("{}h {}m", hours, minutes),
        _ => format!("{}d {}h {}m", days, hours, minutes),
    }
}

pub(crate) fn lowest_scoring(metrics: &RepositoryMetrics) -> Vec<&PullRequestMetrics> {
    let mut ranked: Vec<&PullRequestMetrics> = metrics.pull_requests.values().collect();
    ranked.sort_by(|a, b| a.total_score.total_cmp(&b.total_score).then(a.number.cmp(&b.number)));
    ranked.truncate(LOWEST_SCORING_SHOWN);
    ranked
}

/// Format and print one repository's report to the terminal with colors.
///
/// org/repo on 2024-03-04: 12 closed PRs
///
/// ═══ Review Depth ═══
/// ...
fn print_terminal_report(report: &RepositoryReport) {
    let snapshot = &report.snapshot;
    let m = &snapshot.metrics;
    println!();
    println!(
        "{}/{} on {}: {} closed PRs",
        snapshot.owner,
        snapshot.name,
        snapshot.date,
        m.pull_requests.len()
    );
    println!();

    println!("═══ Review Depth ═══");
    println!(
        "  Median comments per PR: {} (σ {:.2})",
        m.median_comment_count, m.comment_count_std_dev
    );
    println!(
        "  Median words per PR: {} (σ {:.2})",
        m.median_comment_word_count, m.comment_word_count_std_dev
    );
    println!("  Median words per comment: {}", m.median_words_per_comment);
    if let Some(previous) = &report.previous {
        println!("  {}", trend_line(m, previous));
    }
    println!();

    println!("═══ Turnaround ═══");
    println!("  Median time to close: {}", format_seconds(m.median_seconds_to_closure));
    println!("  Median business days to close: {}", m.median_business_days_to_closure);
    println!();

    println!("═══ Lowest Scoring PRs ═══");
    let lowest = lowest_scoring(m);
    if lowest.is_empty() {
        println!("  No closed PRs analyzed.");
    }
    for pr in lowest {
        println!(
            "  • #{} {} {} ({} business days, {} approvals, {} comments)",
            pr.number,
            title_of(report, pr.number),
            colorize_score(pr.total_score),
            pr.business_days_open,
            pr.approval_count,
            pr.comment_count
        );
    }
    println!();
}

fn title_of(report: &RepositoryReport, number: u64) -> &str {
    report.titles.get(&number).map_or("", String::as_str)
}

/// Write every repository's report into one markdown file.
fn write_markdown_report(reports: &[RepositoryReport], path: &Path) -> Result<(), ReportError> {
    let mut md = String::new();
    for report in reports {
        let snapshot = &report.snapshot;
        let m = &snapshot.metrics;
        md.push_str(&format!("# {}/{} ({})\n\n", snapshot.owner, snapshot.name, snapshot.date));
        md.push_str(&format!("**Closed PRs analyzed:** {}\n\n", m.pull_requests.len()));

        md.push_str("## Review Depth\n\n");
        md.push_str("| Metric | Median | Std dev |\n|---|---|---|\n");
        md.push_str(&format!(
            "| Comments per PR | {} | {:.2} |\n",
            m.median_comment_count, m.comment_count_std_dev
        ));
        md.push_str(&format!(
            "| Words per PR | {} | {:.2} |\n",
            m.median_comment_word_count, m.comment_word_count_std_dev
        ));
        md.push_str(&format!("| Words per comment | {} | |\n\n", m.median_words_per_comment));
        if let Some(previous) = &report.previous {
            md.push_str(&format!("_{}_\n\n", trend_line(m, previous)));
        }

        md.push_str("## Turnaround\n\n");
        md.push_str(&format!(
            "- **Median time to close:** {}\n- **Median business days to close:** {}\n\n",
            format_seconds(m.median_seconds_to_closure),
            m.median_business_days_to_closure
        ));

        md.push_str("## Lowest Scoring PRs\n\n");
        let lowest = lowest_scoring(m);
        if lowest.is_empty() {
            md.push_str("No closed PRs analyzed.\n\n");
        } else {
            for pr in lowest {
                md.push_str(&format!(
                    "- **#{}** {} {:.2} points ({} business days, {} approvals, {} comments)\n",
                    pr.number,
                    title_of(report, pr.number),
                    pr.total_score,
                    pr.business_days_open,
                    pr.approval_count,
                    pr.comment_count
                ));
            }
            md.push('\n');
        }
    }

    std::fs::write(path, md)?;
    Ok(())
}

/// Helper to colorize a PR score for terminal output.
fn colorize_score(points: f64) -> colored::ColoredString {
    let text = format!("{:.2}", points);
    if points < 0.0 {
        text.red().bold()
    } else if points < 100.0 {
        text.yellow().bold()
    } else {
        text.green().bold()
    }
}
