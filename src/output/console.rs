//! Console output utilities.

use console::style;

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("WARN").yellow().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("ERROR").red().bold(), message);
}

/// Print the application banner.
pub fn print_banner() {
    let banner = r#"
╔═══════════════════════════════════════════════════════╗
║     Takeout Downloader                                ║
║     Sequential export archive retrieval               ║
╚═══════════════════════════════════════════════════════╝
"#;
    println!("{}", style(banner).cyan());
}

/// Print configuration summary.
pub fn print_config_summary(start: u64, end: u64, output_dir: &str, delay_seconds: u64) {
    println!();
    println!("{}", style("Configuration:").bold());
    println!("  Range:     {}..={}", start, end);
    println!("  Directory: {}", output_dir);
    println!("  Delay:     {} seconds", delay_seconds);
    println!();
}
