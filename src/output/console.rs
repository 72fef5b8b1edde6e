//! Console output utilities.

use std::path::Path;

use console::style;

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("OK").green().bold(), message);
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
    let banner = format!(
        "instascrape {} - Instagram scraper and downloader",
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style(banner).cyan().bold());
}

/// Print what a download run is about to do.
pub fn print_target_summary(target: &str, listings: &[&str], dest: &Path, preload: bool) {
    println!();
    println!("{}", style("Download:").bold());
    println!("  Target:    {}", target);
    println!("  Listings:  {}", listings.join(", "));
    println!("  Directory: {}", dest.display());
    println!("  Preload:   {}", if preload { "on" } else { "off" });
    println!();
}
