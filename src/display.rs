//! Terminal output helpers
//!
//! Provides:
//! - Color-coded status indicators
//! - Styled headers and key/value lines
//! - Stream kind gauge (colored bar showing distribution)

use colored::Colorize;

/// Status indicators
pub struct StatusIcons;

impl StatusIcons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";
    pub const SCAN: &'static str = "🔍";
    pub const IMAGE: &'static str = "🖼";
}

/// Byte count in binary units
pub fn format_bytes(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

const HEADER_WIDTH: usize = 60;

/// Spaces on each side of a centered header title
fn header_padding(title: &str) -> usize {
    HEADER_WIDTH.saturating_sub(title.chars().count() + 4) / 2
}

/// Print a styled header
pub fn print_header(title: &str) {
    let padding = header_padding(title);

    println!();
    println!("{}", "═".repeat(HEADER_WIDTH).cyan());
    println!(
        "{}  {}  {}",
        " ".repeat(padding),
        title.bright_white().bold(),
        " ".repeat(padding)
    );
    println!("{}", "═".repeat(HEADER_WIDTH).cyan());
    println!();
}

/// Print a styled subheader
pub fn print_subheader(title: &str) {
    println!("\n{} {}", "▶".bright_cyan(), title.bright_white());
    println!("{}", "─".repeat(40).bright_black());
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {}: {}", key.bright_black(), value.white());
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("{} {}", StatusIcons::SUCCESS.green(), msg.green());
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("{} {}", StatusIcons::ERROR.red(), msg.red());
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("{} {}", StatusIcons::WARNING.yellow(), msg.yellow());
}

/// Print an info message
pub fn print_info(msg: &str) {
    println!("{} {}", StatusIcons::INFO.cyan(), msg.cyan());
}

/// Width of each gauge segment, at least one cell per non-empty entry
fn gauge_widths(counts: &[usize], bar_width: usize) -> Vec<usize> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![0; counts.len()];
    }
    counts
        .iter()
        .map(|&c| ((c as f64 / total as f64 * bar_width as f64) as usize).max(1))
        .collect()
}

/// Print stream kind gauge: (kind tag, count, bytes)
pub fn print_kind_gauge(kinds: &[(String, usize, u64)]) {
    let counts: Vec<usize> = kinds.iter().map(|(_, c, _)| *c).collect();
    if counts.iter().sum::<usize>() == 0 {
        return;
    }

    let colors = [
        "\x1b[35m", // Magenta
        "\x1b[36m", // Cyan
        "\x1b[33m", // Yellow
        "\x1b[32m", // Green
        "\x1b[34m", // Blue
        "\x1b[37m", // White
    ];

    print!("  [");
    for (i, width) in gauge_widths(&counts, 50).into_iter().enumerate() {
        let color = colors[i % colors.len()];
        print!("{}{}\x1b[0m", color, "█".repeat(width));
    }
    println!("]");

    // Legend
    for (i, (name, count, bytes)) in kinds.iter().enumerate() {
        let color = colors[i % colors.len()];
        println!("  {}█\x1b[0m {} {} ({})", color, name, count, format_bytes(*bytes));
    }
}
