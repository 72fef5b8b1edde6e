//! Statistics reporting.

use console::style;

use crate::download::DownloadSummary;
use crate::model::Profile;

/// Print statistics of one download run.
pub fn print_download_summary(label: &str, summary: &DownloadSummary) {
    println!();
    println!("{}", style(format!("Statistics for {}:", label)).bold());
    println!("  Posts:    {}", summary.posts);
    println!("  Pictures: {}", summary.images);
    println!("  Videos:   {}", summary.videos);
    println!("  Skipped:  {} (already present)", summary.skipped);
    if !summary.failures.is_empty() {
        println!("  Failed:   {}", style(summary.failures.len()).red());
        for failure in &summary.failures {
            println!(
                "    #{} {}: {}",
                failure.position,
                failure.key,
                style(&failure.message).dim()
            );
        }
    }
    println!("  Total:    {} downloaded", summary.downloaded());
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Print the public details of a profile.
pub fn print_profile(profile: &Profile) {
    let mut name = style(format!("@{}", profile.username)).bold().to_string();
    if profile.is_verified {
        name.push_str(" (verified)");
    }
    if profile.is_private {
        name.push_str(" (private)");
    }
    println!("{}", name);
    if let Some(full_name) = &profile.full_name {
        println!("  Name:       {}", full_name);
    }
    println!("  Id:         {}", profile.id);
    println!("  Posts:      {}", count(profile.posts_count));
    println!("  Followers:  {}", count(profile.followers_count));
    println!("  Followings: {}", count(profile.followings_count));
    if let Some(bio) = profile.biography.as_deref().filter(|b| !b.is_empty()) {
        println!("  Bio:        {}", bio.replace('\n', " "));
    }
    if let Some(site) = &profile.website {
        println!("  Website:    {}", site);
    }
}
