use crate::cli::args::LogoutArgs;
use crate::error::{Error, Result};
use crate::output::{print_info, print_success};
use crate::scraper::Scraper;

pub(super) async fn run(scraper: &Scraper, args: LogoutArgs) -> Result<()> {
    let authenticator = scraper.authenticator();
    let store = authenticator.store();

    match scraper.resume().await {
        Ok(true) => {}
        Ok(false) => {
            print_info("Not logged in");
            return Ok(());
        }
        // nothing to close remotely; drop the stale copy
        Err(Error::AuthExpired) => {
            if let (true, Some(account)) = (args.real, store.current()?) {
                match store.delete(&account) {
                    Ok(()) | Err(Error::SessionNotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
            store.clear_current()?;
            print_success("Logged out");
            return Ok(());
        }
        Err(e) => return Err(e),
    }

    if args.real {
        authenticator.logout().await?;
        print_success("Logged out and removed the stored session");
    } else {
        authenticator.pause().await?;
        print_success("Logged out (session kept, use `cookies` to manage it)");
    }
    Ok(())
}
