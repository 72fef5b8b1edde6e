use std::path::Path;
use std::sync::Arc;

use crate::cli::args::DownloadArgs;
use crate::config::{parse_target, Target};
use crate::download::{DownloadSummary, Downloader, Hooks};
use crate::error::{Error, Result};
use crate::fs::listing_folder;
use crate::model::{Post, Profile};
use crate::output::{
    create_item_bar, print_download_summary, print_error, print_success, print_target_summary,
    print_warning,
};
use crate::pipeline::ItemSequence;
use crate::scraper::Scraper;

use super::configure;

pub(super) async fn run(scraper: &Scraper, args: DownloadArgs) -> Result<()> {
    // parse everything up front so a typo fails before any download
    let targets = args
        .targets
        .iter()
        .map(|t| parse_target(t))
        .collect::<Result<Vec<_>>>()?;

    let base = scraper.config().download.dest_dir();
    let mut failed_targets = 0;
    for target in targets {
        match download_target(scraper, &args, &base, &target).await {
            Ok(()) => {}
            Err(e) if !e.is_fatal() && targets_are_independent(&e) => {
                print_error(&format!("{}: {}", target, e));
                failed_targets += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if failed_targets > 0 {
        return Err(Error::Download(format!(
            "{} target(s) could not be downloaded",
            failed_targets
        )));
    }
    Ok(())
}

/// Errors that only concern the target they came from.
fn targets_are_independent(error: &Error) -> bool {
    matches!(
        error,
        Error::NotFound(_) | Error::Item { .. } | Error::Download(_)
    )
}

async fn download_target(
    scraper: &Scraper,
    args: &DownloadArgs,
    base: &Path,
    target: &Target,
) -> Result<()> {
    match target {
        Target::Profile(username) => {
            let profile = scraper.profile(username).await?;
            let listings = args.profile_listings();
            print_target_summary(&target.to_string(), &listings, base, args.listing.preload);

            if args.pic {
                let report = downloader(scraper, base, None)
                    .download_profile_picture(&profile)
                    .await?;
                print_success(&format!("Profile picture: {}", report.path.display()));
            }
            for listing in listings {
                let sequence = match listing {
                    "tagged" => scraper.tagged(&profile)?,
                    "igtv" => scraper.igtv(&profile)?,
                    _ => scraper.timeline(&profile)?,
                };
                let dest = base.join(listing_folder(listing, '@', &profile.username)?);
                download_listing(scraper, args, &dest, sequence, &label(listing, &profile)).await?;
            }
            Ok(())
        }
        Target::Hashtag(tag) => {
            let listings = args.hashtag_listings();
            print_target_summary(&target.to_string(), &listings, base, args.listing.preload);
            for listing in listings {
                let sequence = match listing {
                    "top" => scraper.hashtag_top(tag)?,
                    _ => scraper.hashtag(tag)?,
                };
                let dest = base.join(listing_folder(listing, '#', tag)?);
                let label = format!("{} #{}", listing, tag);
                download_listing(scraper, args, &dest, sequence, &label).await?;
            }
            Ok(())
        }
        Target::Saved => {
            print_target_summary("saved", &["saved"], base, args.listing.preload);
            let sequence = scraper.saved().await?;
            let account = scraper
                .handle()
                .current()
                .await
                .map(|s| s.account)
                .ok_or(Error::AuthenticationRequired)?;
            let dest = base.join(listing_folder("saved", '@', &account)?);
            download_listing(scraper, args, &dest, sequence, "saved posts").await
        }
        Target::Post(shortcode) => {
            let post = scraper.post(shortcode).await?;
            let report = downloader(scraper, base, None).download_post(&post).await?;
            print_success(&format!(
                "Post {}: {} downloaded, {} skipped",
                report.shortcode,
                report.downloaded(),
                report.skipped()
            ));
            Ok(())
        }
    }
}

fn label(listing: &str, profile: &Profile) -> String {
    format!("{} of @{}", listing, profile.username)
}

fn downloader(scraper: &Scraper, dest: &Path, hooks: Option<Hooks>) -> Downloader {
    let mut options = scraper.config().download.options();
    options.dest = dest.to_path_buf();
    let downloader = Downloader::new(Arc::clone(scraper.client()), options)
        .with_session(scraper.handle().clone());
    match hooks {
        Some(hooks) => downloader.with_hooks(hooks),
        None => downloader,
    }
}

async fn download_listing(
    scraper: &Scraper,
    args: &DownloadArgs,
    dest: &Path,
    mut sequence: ItemSequence<Post>,
    label: &str,
) -> Result<()> {
    configure(&mut sequence, &args.listing)?;

    let show_progress = scraper.config().download.show_progress;
    let bar = show_progress.then(|| {
        let total = args.listing.limit.map(|l| l as u64);
        create_item_bar(total, label)
    });
    let hooks = bar.clone().map(|bar| {
        let failed = bar.clone();
        Hooks::new()
            .on_finish(move |_, _| {
                bar.inc(1);
                Ok(())
            })
            .on_error(move |_| {
                failed.inc(1);
                Ok(())
            })
    });

    let result = downloader(scraper, dest, hooks)
        .download_all(&mut sequence)
        .await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let summary: DownloadSummary = result?;
    print_download_summary(label, &summary);
    if !summary.is_clean() {
        print_warning(&format!(
            "{} post(s) of {} failed",
            summary.failures.len(),
            label
        ));
    }
    Ok(())
}
