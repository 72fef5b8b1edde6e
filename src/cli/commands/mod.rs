//! Subcommand implementations.

mod cookies;
mod download;
mod dump;
mod login;
mod logout;
mod whoami;

use console::Term;

use crate::cli::args::{Command, ListingArgs};
use crate::cli::filter;
use crate::config::{validate_config, Config};
use crate::error::{Error, Result};
use crate::model::Record;
use crate::output::print_warning;
use crate::pipeline::ItemSequence;
use crate::scraper::Scraper;

/// Run one subcommand against `config`, after merging its flags.
pub async fn execute(command: Command, mut config: Config) -> Result<()> {
    match &command {
        Command::Download(args) => args.merge_into_config(&mut config),
        Command::Dump(args) => args.listing.merge_into_config(&mut config),
        _ => {}
    }
    validate_config(&config)?;

    let scraper = Scraper::new(config)?;
    match command {
        Command::Login(args) => login::run(&scraper, args).await,
        Command::Logout(args) => logout::run(&scraper, args).await,
        Command::Cookies(args) => cookies::run(&scraper, args).await,
        Command::Whoami => whoami::run(&scraper).await,
        Command::Dump(args) => {
            resume(&scraper).await?;
            dump::run(&scraper, args).await
        }
        Command::Download(args) => {
            resume(&scraper).await?;
            download::run(&scraper, args).await
        }
    }
}

/// Install the stored session if there is one. An expired session is
/// reported and the command continues anonymously.
async fn resume(scraper: &Scraper) -> Result<bool> {
    match scraper.resume().await {
        Ok(resumed) => Ok(resumed),
        Err(Error::AuthExpired) => {
            print_warning("Stored session has expired; continuing without login");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Apply `--limit`, `--preload` and `--filter` to a sequence.
fn configure<R: Record>(sequence: &mut ItemSequence<R>, args: &ListingArgs) -> Result<()> {
    sequence.limit(args.limit)?.preload(args.preload)?;
    if let Some(predicate) = filter::compile::<R>(&args.filters, args.preload)? {
        sequence.filter(predicate)?;
    }
    Ok(())
}

fn prompt(term: &Term, label: &str) -> Result<String> {
    term.write_str(label)?;
    let line = term.read_line()?;
    let line = line.trim();
    if line.is_empty() {
        return Err(Error::Usage(format!("{} is required", label.trim_end_matches(": "))));
    }
    Ok(line.to_string())
}

fn prompt_secret(term: &Term, label: &str) -> Result<String> {
    term.write_str(label)?;
    let line = term.read_secure_line()?;
    if line.is_empty() {
        return Err(Error::Usage(format!("{} is required", label.trim_end_matches(": "))));
    }
    Ok(line)
}
