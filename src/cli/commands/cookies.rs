use console::style;

use crate::cli::args::{CookiesAction, CookiesArgs};
use crate::error::{Error, Result};
use crate::output::{print_info, print_success, print_warning};
use crate::scraper::Scraper;

pub(super) async fn run(scraper: &Scraper, args: CookiesArgs) -> Result<()> {
    match args.action.unwrap_or(CookiesAction::List) {
        CookiesAction::List => list(scraper),
        CookiesAction::Save => save(scraper).await,
        CookiesAction::Remove { accounts } => remove(scraper, &accounts),
    }
}

fn list(scraper: &Scraper) -> Result<()> {
    let store = scraper.authenticator().store();
    let accounts = store.list()?;
    if accounts.is_empty() {
        print_info("No stored sessions");
        return Ok(());
    }

    let current = store.current()?;
    println!("{}", style("Stored sessions:").bold());
    for account in accounts {
        let marker = if current.as_deref() == Some(account.as_str()) {
            "*"
        } else {
            " "
        };
        let last_used = store.last_used(&account)?.format("%Y-%m-%d %H:%M");
        match store.load(&account) {
            Ok(session) => {
                let expiry = match session.expires_at {
                    Some(_) if session.is_expired() => style("expired".to_string()).red(),
                    Some(at) => style(format!("expires {}", at.format("%Y-%m-%d"))).dim(),
                    None => style("no expiry".to_string()).dim(),
                };
                println!("{} @{:<30} last login {}  {}", marker, account, last_used, expiry);
            }
            Err(Error::Corrupted { message, .. }) => {
                println!("{} @{:<30} {}", marker, account, style(format!("unreadable: {}", message)).red());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

async fn save(scraper: &Scraper) -> Result<()> {
    scraper.resume().await?;
    let session = scraper
        .handle()
        .current()
        .await
        .filter(|s| s.is_authenticated())
        .ok_or(Error::AuthenticationRequired)?;

    let store = scraper.authenticator().store();
    store.save(&session.account, &session)?;
    store.set_current(&session.account)?;
    print_success(&format!("Saved session of @{}", session.account));
    Ok(())
}

fn remove(scraper: &Scraper, accounts: &[String]) -> Result<()> {
    let store = scraper.authenticator().store();
    let current = store.current()?;
    for account in accounts {
        let account = account.trim_start_matches('@');
        match store.delete(account) {
            Ok(()) => print_success(&format!("Removed @{}", account)),
            Err(Error::SessionNotFound(_)) => {
                print_warning(&format!("No stored session for @{}", account))
            }
            Err(e) => return Err(e),
        }
        if current.as_deref() == Some(account) {
            store.clear_current()?;
        }
    }
    Ok(())
}
