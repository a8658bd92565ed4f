//! Terminal presentation: result tables, selections, progress and summaries.

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

use crate::diagnostics::ProbeReport;
use crate::download::DownloadObserver;
use crate::models::{BatchReport, DownloadOutcome, DownloadStatus, PaperRecord};

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Download,
    Search,
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Download => "↓",
        Status::Search => "🔍",
    }
}

/// Print a styled status message to stderr.
pub fn print_status(status: Status, msg: &str) {
    let icon = status_icon(status);
    match status {
        Status::Success => eprintln!("{} {}", icon.green().bold(), msg),
        Status::Error => eprintln!("{} {}", icon.red().bold(), msg),
        Status::Warning => eprintln!("{} {}", icon.yellow().bold(), msg),
        Status::Info => eprintln!("{} {}", icon.cyan().bold(), msg),
        Status::Download => eprintln!("{} {}", icon.magenta(), msg),
        Status::Search => eprintln!("{} {}", icon.yellow(), msg),
    }
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// Print search results header.
pub fn print_search_header(keywords: &str, count: usize, duration: Duration) {
    println!();
    println!(
        "{} Search results for: \"{}\"",
        status_icon(Status::Search).yellow().bold(),
        keywords.cyan().bold()
    );
    println!(
        "{} Found {} papers in {:.2}s",
        "─".repeat(30).dimmed(),
        count.to_string().green().bold(),
        duration.as_secs_f64()
    );
    println!();
}

/// Truncate text to fit within the specified display width.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if max_width <= 3 {
        return "...".to_string();
    }

    let total_width: usize = text
        .chars()
        .map(|c| unicode_width::UnicodeWidthChar::width(c).unwrap_or(1))
        .sum();
    if total_width <= max_width {
        return text.to_string();
    }

    let budget = max_width - 3;
    let mut width = 0;
    let mut truncated = String::new();
    for c in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(1);
        if width + w > budget {
            break;
        }
        width += w;
        truncated.push(c);
    }

    format!("{}...", truncated)
}

/// Client-side ordering applied before display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Keep the backend's order
    #[default]
    Default,
    /// Case-insensitive title
    Title,
    /// Publication date
    Date,
}

/// Sort records for display; the default key leaves them untouched
pub fn sort_records(records: &mut [PaperRecord], key: SortKey, descending: bool) {
    match key {
        SortKey::Default => return,
        SortKey::Title => records.sort_by_key(|r| r.title.to_lowercase()),
        SortKey::Date => records.sort_by(|a, b| a.published_date.cmp(&b.published_date)),
    }
    if descending {
        records.reverse();
    }
}

/// Result table with 1-based row numbers usable in `--select`
pub fn paper_table(records: &[PaperRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Title", "Authors", "Published", "Categories", "PDF"]);

    for (i, paper) in records.iter().enumerate() {
        let pdf = if paper.has_pdf() {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        };

        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(truncate_with_ellipsis(&paper.title, 60)).add_attribute(Attribute::Bold),
            Cell::new(truncate_with_ellipsis(&paper.author_line(), 30)),
            Cell::new(&paper.published_date),
            Cell::new(truncate_with_ellipsis(&paper.category_line(), 20)),
            pdf,
        ]);
    }

    table
}

/// Plain listing, one block per record
pub fn print_plain(records: &[PaperRecord]) {
    for (i, paper) in records.iter().enumerate() {
        println!("{}. {} ({})", i + 1, paper.title, paper.published_date);
        println!("   Authors: {}", paper.author_line());
        println!("   Link: {}", paper.id);
        if let Some(pdf_url) = &paper.pdf_url {
            println!("   PDF: {}", pdf_url);
        }
        println!("   {}", truncate_with_ellipsis(&paper.summary, 150));
        println!();
    }
}

/// Invalid `--select` input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Invalid selection '{0}'")]
    Invalid(String),

    #[error("Selection {index} is out of range (1-{len})")]
    OutOfRange { index: usize, len: usize },

    #[error("Nothing selected")]
    Empty,
}

/// Parse a 1-based selection such as `"1,3-5"` or `"all"` into 0-based indexes
///
/// Duplicates are dropped; the first occurrence keeps its position.
pub fn parse_selection(spec: &str, len: usize) -> Result<Vec<usize>, SelectionError> {
    let spec = spec.trim();
    if spec.eq_ignore_ascii_case("all") {
        return if len == 0 {
            Err(SelectionError::Empty)
        } else {
            Ok((0..len).collect())
        };
    }

    let parse = |s: &str| -> Result<usize, SelectionError> {
        let index: usize = s
            .trim()
            .parse()
            .map_err(|_| SelectionError::Invalid(s.trim().to_string()))?;
        if index == 0 || index > len {
            return Err(SelectionError::OutOfRange { index, len });
        }
        Ok(index - 1)
    };

    let mut selected = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let range = match part.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if start > end {
                    return Err(SelectionError::Invalid(part.to_string()));
                }
                start..=end
            }
            None => {
                let index = parse(part)?;
                index..=index
            }
        };

        for index in range {
            if !selected.contains(&index) {
                selected.push(index);
            }
        }
    }

    if selected.is_empty() {
        return Err(SelectionError::Empty);
    }
    Ok(selected)
}

/// Progress bar that follows a running batch download
pub struct DownloadProgress {
    pb: indicatif::ProgressBar,
}

impl DownloadProgress {
    pub fn new(total: usize) -> Self {
        let pb = indicatif::ProgressBar::new(total as u64);
        let style = indicatif::ProgressStyle::with_template(
            "{spinner:.cyan} {bar:40.cyan/blue} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
        .progress_chars("█▓▒░ ");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    /// Hidden bar, for non-interactive output
    pub fn hidden() -> Self {
        Self {
            pb: indicatif::ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl DownloadObserver for DownloadProgress {
    fn record_started(&self, _index: usize, _total: usize, record: &PaperRecord) {
        self.pb
            .set_message(truncate_with_ellipsis(&record.title, 40));
    }

    fn record_finished(
        &self,
        _index: usize,
        _total: usize,
        outcome: &DownloadOutcome,
        _completed: usize,
    ) {
        self.pb.inc(1);
        if !self.pb.is_hidden() {
            let line = outcome_line(outcome);
            self.pb.suspend(|| eprintln!("{}", line));
        }
    }
}

/// One coloured line describing a record's outcome
pub fn outcome_line(outcome: &DownloadOutcome) -> String {
    let title = truncate_with_ellipsis(&outcome.record.title, 50);
    match &outcome.status {
        DownloadStatus::Saved(path) => format!(
            "{} {} -> {}",
            status_icon(Status::Success).green().bold(),
            title,
            path.display().dimmed()
        ),
        DownloadStatus::Skipped(reason) => format!(
            "{} {} (skipped: {})",
            status_icon(Status::Warning).yellow().bold(),
            title,
            reason
        ),
        DownloadStatus::Failed(failure) => format!(
            "{} {} ({})",
            status_icon(Status::Error).red().bold(),
            title,
            failure
        ),
    }
}

/// Print the aggregate batch result
pub fn print_batch_summary(report: &BatchReport) {
    let summary = report.summary();
    if report.is_failure() {
        print_status(Status::Error, &format!("Download failed: {}", summary));
    } else if report.is_partial() || report.cancelled {
        print_status(Status::Warning, &format!("Partially downloaded: {}", summary));
    } else {
        print_status(Status::Success, &format!("Downloaded: {}", summary));
    }
}

/// Print a reachability report
pub fn print_probe_report(report: &ProbeReport) {
    print_section("Backend reachability");
    println!("  Mode:    {}", report.mode);
    println!("  Target:  {}", report.target);
    println!("  Latency: {} ms", report.latency.as_millis());
    println!("  Result:  {}", report.detail);

    if report.is_healthy() {
        print_status(Status::Success, "Backend is reachable");
    } else if report.reachable {
        print_status(Status::Warning, "Backend answered with an error status");
    } else {
        print_status(Status::Error, "Backend is unreachable");
    }
}

/// Spinner shown while a search is in flight.
pub struct Spinner {
    pb: indicatif::ProgressBar,
}

impl Spinner {
    /// Create a new spinner with the given message.
    pub fn new(msg: &str) -> Self {
        let pb = indicatif::ProgressBar::new_spinner();
        let style = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");
        pb.set_style(style);
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    /// Hidden spinner, for quiet or non-interactive output.
    pub fn hidden() -> Self {
        Self {
            pb: indicatif::ProgressBar::hidden(),
        }
    }

    /// Finish the spinner and clear its line.
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
