use console::Term;

use crate::cli::args::LoginArgs;
use crate::error::{Error, Result};
use crate::output::{print_info, print_success, print_warning};
use crate::scraper::Scraper;
use crate::session::{ChallengeMethod, LoginOutcome, Session};

use super::{prompt, prompt_secret};

/// Attempts at a two-factor code before giving up.
const CODE_ATTEMPTS: usize = 3;

pub(super) async fn run(scraper: &Scraper, args: LoginArgs) -> Result<()> {
    let term = Term::stderr();
    let username = match args.username {
        Some(username) => username,
        None => prompt(&term, "Username: ")?,
    };
    let password = match args.password {
        Some(password) => password,
        None => prompt_secret(&term, "Password: ")?,
    };

    let authenticator = scraper.authenticator();
    let session = match authenticator.login(&username, &password).await? {
        LoginOutcome::Authenticated(session) => session,
        LoginOutcome::TwoFactorRequired(challenge) => {
            print_info(&format!(
                "Two-factor authentication required. Code sent to {}",
                challenge.obfuscated_phone.as_deref().unwrap_or("your device")
            ));
            two_factor(scraper, &term, &challenge).await?
        }
        LoginOutcome::CheckpointRequired(challenge) => {
            print_info("Instagram requires a security check for this login");
            let method = match prompt(&term, "Send the code by (0) SMS or (1) email: ")?.as_str() {
                "0" => ChallengeMethod::Sms,
                "1" => ChallengeMethod::Email,
                other => return Err(Error::Usage(format!("Unknown choice '{}'", other))),
            };
            authenticator
                .request_checkpoint_code(&challenge, method)
                .await?;
            let code = prompt(&term, "Security code: ")?;
            authenticator.solve_checkpoint(&challenge, &code).await?
        }
    };

    print_success(&format!("Logged in as @{}", session.account));
    Ok(())
}

async fn two_factor(
    scraper: &Scraper,
    term: &Term,
    challenge: &crate::session::TwoFactorChallenge,
) -> Result<Session> {
    let mut attempt = 1;
    loop {
        let code = prompt(term, "Security code: ")?;
        match scraper
            .authenticator()
            .submit_two_factor(challenge, &code)
            .await
        {
            Err(Error::Auth(message)) if attempt < CODE_ATTEMPTS => {
                print_warning(&message);
                attempt += 1;
            }
            result => return result,
        }
    }
}
