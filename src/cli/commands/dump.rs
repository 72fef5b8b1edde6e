use std::path::Path;

use serde::Serialize;

use crate::cli::args::{DumpArgs, ListingArgs};
use crate::config::{parse_target, Target};
use crate::download::ItemFailure;
use crate::error::{Error, Result};
use crate::fs::write_atomic;
use crate::model::Record;
use crate::output::{create_spinner, print_success, print_warning};
use crate::pipeline::ItemSequence;
use crate::scraper::Scraper;

use super::configure;

pub(super) async fn run(scraper: &Scraper, args: DumpArgs) -> Result<()> {
    let target = parse_target(&args.target)?;
    let json = match target {
        Target::Profile(username) => {
            let profile = scraper.profile(&username).await?;
            if args.followers {
                let sequence = scraper.followers(&profile)?;
                collect("followers", sequence, &args.listing).await?
            } else if args.followings {
                let sequence = scraper.followings(&profile)?;
                collect("followings", sequence, &args.listing).await?
            } else if args.likes || args.comments {
                return Err(Error::Usage(
                    "--likes and --comments need a :shortcode target".into(),
                ));
            } else {
                serde_json::to_value(&profile)?
            }
        }
        Target::Post(shortcode) => {
            let post = scraper.post(&shortcode).await?;
            if args.likes {
                let sequence = scraper.likes(&post)?;
                collect("likes", sequence, &args.listing).await?
            } else if args.comments {
                let sequence = scraper.comments(&post)?;
                collect("comments", sequence, &args.listing).await?
            } else if args.followers || args.followings {
                return Err(Error::Usage(
                    "--followers and --followings need an @user target".into(),
                ));
            } else {
                serde_json::to_value(&post)?
            }
        }
        other => {
            return Err(Error::Usage(format!(
                "Cannot dump {}; use @user or :shortcode",
                other
            )))
        }
    };

    let mut text = serde_json::to_string_pretty(&json)?;
    text.push('\n');
    match &args.outfile {
        Some(path) => write_output(path, &text)?,
        None => print!("{}", text),
    }
    Ok(())
}

/// Walk a listing into a JSON array. Failed items are reported and left out.
async fn collect<R: Record + Serialize>(
    name: &str,
    mut sequence: ItemSequence<R>,
    args: &ListingArgs,
) -> Result<serde_json::Value> {
    configure(&mut sequence, args)?;
    let spinner = create_spinner(&format!("Fetching {}...", name));

    let mut items = Vec::new();
    while let Some(item) = sequence.next().await {
        match item {
            Ok(record) => {
                items.push(serde_json::to_value(&record)?);
                spinner.set_message(format!("Fetching {}... {}", name, items.len()));
            }
            Err(e) => match ItemFailure::from_item_error(&e) {
                Some(failure) => spinner.suspend(|| {
                    print_warning(&format!("Skipped {}: {}", failure.key, failure.message))
                }),
                None => {
                    spinner.finish_and_clear();
                    return Err(e);
                }
            },
        }
    }

    spinner.finish_and_clear();
    tracing::info!("Collected {} {}", items.len(), name);
    Ok(serde_json::Value::Array(items))
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    write_atomic(path, text.as_bytes())?;
    print_success(&format!("Wrote {}", path.display()));
    Ok(())
}
