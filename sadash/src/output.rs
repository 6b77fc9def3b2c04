//! Plain-text rendering of tasks, reports and statistics.

use sadash_core::store::Stats;
use sadash_core::{Channel, Issue, Report, Task};

/// Shorten `text` to `width` characters, marking the cut with `...`
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let keep = width.saturating_sub(3);
    format!("{}...", text.chars().take(keep).collect::<String>())
}

pub fn print_tasks(tasks: &[&Task]) {
    println!(
        "{:<24} {:<10} {:>7} {:>20}",
        "Task ID", "State", "Issues", "Indexed"
    );
    println!("{:-<64}", "");

    for task in tasks {
        let indexed = task
            .data
            .indexed
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        let issues = task
            .data
            .issues
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<24} {:<10} {:>7} {:>20}",
            truncate(&task.task_id, 24),
            task.data.state.as_deref().unwrap_or("unknown"),
            issues,
            indexed
        );
    }
}

/// `path:line` of an issue, when the analyzer reported one
fn location(issue: &Issue) -> String {
    let path = issue.extra.get("path").and_then(|v| v.as_str());
    let line = issue.extra.get("line").and_then(|v| v.as_u64());
    match (path, line) {
        (Some(path), Some(line)) => format!("{}:{}", path, line),
        (Some(path), None) => path.to_string(),
        _ => "-".to_string(),
    }
}

/// One-line description of the analyzed revision
fn describe_revision(revision: &serde_json::Value) -> String {
    let field = |name: &str| revision.get(name).and_then(|v| v.as_str());
    match (field("source"), field("url"), field("rev")) {
        (Some(source), Some(url), _) => format!("{} {}", source, url),
        (Some(source), None, Some(rev)) => format!("{} {}", source, rev),
        (_, Some(url), _) => url.to_string(),
        _ => "unknown".to_string(),
    }
}

pub fn print_report(report: &Report, all: bool) {
    println!("Task:        {}", report.task_id);
    println!("Revision:    {}", describe_revision(&report.revision));
    if let Some(created) = report.created_at() {
        println!("Analyzed:    {}", created.format("%Y-%m-%d %H:%M:%S"));
    }
    println!(
        "Issues:      {} ({} publishable)",
        report.issues.len(),
        report.publishable_issues().count()
    );
    println!();

    let issues: Vec<&Issue> = if all {
        report.issues.iter().collect()
    } else {
        report.publishable_issues().collect()
    };

    if issues.is_empty() {
        println!("No issues to show.");
        return;
    }

    for issue in issues {
        let marker = if issue.publishable { "*" } else { " " };
        println!(
            "{} {:<22} {:<32} {}",
            marker,
            truncate(&issue.analyzer_label(), 22),
            truncate(issue.check_name(), 32),
            location(issue)
        );
        if let Some(message) = &issue.message {
            println!("    {}", truncate(message, 100));
        }
    }
}

pub fn print_stats(channel: Channel, stats: &Stats, top: usize) {
    let totals = stats.totals();

    println!("Channel:     {}", channel);
    println!("Reports:     {}/{}", stats.loaded, stats.ids.len());
    println!("Since:       {}", stats.start_date.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "Checks:      {} ({} publishable of {} issues)",
        totals.checks, totals.publishable, totals.total
    );
    println!();

    if stats.checks.is_empty() {
        println!("No issues found.");
        return;
    }

    println!(
        "{:<24} {:<40} {:>11} {:>7}",
        "Analyzer", "Check", "Publishable", "Total"
    );
    println!("{:-<85}", "");

    for check in stats.sorted_checks().into_iter().take(top) {
        println!(
            "{:<24} {:<40} {:>11} {:>7}",
            truncate(&check.analyzer, 24),
            truncate(&check.check, 40),
            check.publishable,
            check.total
        );
    }
}
