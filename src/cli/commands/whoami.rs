use crate::error::{Error, Result};
use crate::output::{print_info, print_profile, print_warning};
use crate::scraper::Scraper;

pub(super) async fn run(scraper: &Scraper) -> Result<()> {
    match scraper.resume().await {
        Ok(true) => {}
        Ok(false) => {
            print_info("Not logged in");
            return Ok(());
        }
        Err(Error::AuthExpired) => {
            print_warning("The stored session has expired");
            return Err(Error::AuthExpired);
        }
        Err(e) => return Err(e),
    }

    if let Some(session) = scraper.handle().current().await {
        let since = session.created_at.format("%Y-%m-%d %H:%M");
        match session.expires_at {
            Some(at) => print_info(&format!(
                "Logged in as @{} since {} (expires {})",
                session.account,
                since,
                at.format("%Y-%m-%d")
            )),
            None => print_info(&format!("Logged in as @{} since {}", session.account, since)),
        }
    }

    print_profile(&scraper.me().await?);
    Ok(())
}
