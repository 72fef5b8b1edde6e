//! Configuration validation and target parsing.

use regex::Regex;
use url::Url;

use crate::config::loader::Config;
use crate::error::{Error, Result};

/// Maximum username length accepted by the service.
const MAX_USERNAME_LENGTH: usize = 30;

/// Largest page the listing endpoints serve.
const MAX_PAGE_SIZE: usize = 50;

fn invalid(field: &str, message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.network.user_agent.trim().is_empty() {
        return Err(Error::MissingConfig("network.user_agent".to_string()));
    }
    if config.network.retry_attempts == 0 {
        return Err(invalid("network.retry_attempts", "must be at least 1"));
    }
    if config.network.backoff_base_ms > config.network.backoff_max_ms {
        return Err(invalid(
            "network.backoff_base_ms",
            format!(
                "must not exceed network.backoff_max_ms ({} > {})",
                config.network.backoff_base_ms, config.network.backoff_max_ms
            ),
        ));
    }
    if config.network.timeout_secs == 0 {
        return Err(invalid("network.timeout_secs", "must be at least 1"));
    }
    if config.preload.workers == 0 {
        return Err(invalid("preload.workers", "must be at least 1"));
    }
    if config.preload.queue_multiplier == 0 {
        return Err(invalid("preload.queue_multiplier", "must be at least 1"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&config.preload.page_size) {
        return Err(invalid(
            "preload.page_size",
            format!("must be between 1 and {}", MAX_PAGE_SIZE),
        ));
    }
    Ok(())
}

/// What a `download` or `dump` invocation points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `@username`
    Profile(String),
    /// `:shortcode` or a post URL
    Post(String),
    /// `#tag`
    Hashtag(String),
    /// Saved posts of the logged-in user.
    Saved,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Profile(name) => write!(f, "@{}", name),
            Target::Post(shortcode) => write!(f, ":{}", shortcode),
            Target::Hashtag(tag) => write!(f, "#{}", tag),
            Target::Saved => f.write_str("saved"),
        }
    }
}

const USERNAME_PATTERN: &str = r"^[A-Za-z0-9._]+$";
const SHORTCODE_PATTERN: &str = r"^[A-Za-z0-9_-]+$";
const HASHTAG_PATTERN: &str = r"^\w+$";

fn pattern(source: &str) -> Result<Regex> {
    Regex::new(source).map_err(|e| Error::Config(format!("bad pattern {}: {}", source, e)))
}

/// Validate an account username, without the leading `@`.
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() > MAX_USERNAME_LENGTH {
        return Err(Error::Usage(format!(
            "Username '{}' must be 1 to {} characters",
            username, MAX_USERNAME_LENGTH
        )));
    }
    if !pattern(USERNAME_PATTERN)?.is_match(username) {
        return Err(Error::Usage(format!(
            "Username '{}' contains invalid characters. Only letters, digits, '.' and '_' allowed.",
            username
        )));
    }
    Ok(())
}

/// Extract a shortcode from a post URL or a bare shortcode.
pub fn parse_shortcode(input: &str) -> Result<String> {
    let input = input.trim();

    if input.starts_with("http://") || input.starts_with("https://") {
        return shortcode_from_url(input);
    }

    if pattern(SHORTCODE_PATTERN)?.is_match(input) {
        Ok(input.to_string())
    } else {
        Err(Error::Usage(format!("Invalid post shortcode: '{}'", input)))
    }
}

/// `https://www.instagram.com/p/<shortcode>/`, also `/tv/` and `/reel/`.
fn shortcode_from_url(input: &str) -> Result<String> {
    let url = Url::parse(input)?;
    let not_a_post = || Error::Usage(format!("Not a post URL: {}", input));

    let host = url.host_str().ok_or_else(not_a_post)?;
    if host != "instagram.com" && !host.ends_with(".instagram.com") {
        return Err(not_a_post());
    }

    let shortcode = pattern(SHORTCODE_PATTERN)?;
    let mut segments = url.path_segments().ok_or_else(not_a_post)?;
    match (segments.next(), segments.next()) {
        (Some("p" | "tv" | "reel"), Some(code)) if shortcode.is_match(code) => {
            Ok(code.to_string())
        }
        _ => Err(not_a_post()),
    }
}

/// Parse a command-line target.
pub fn parse_target(input: &str) -> Result<Target> {
    let input = input.trim();

    if let Some(name) = input.strip_prefix('@') {
        validate_username(name)?;
        return Ok(Target::Profile(name.to_string()));
    }
    if let Some(tag) = input.strip_prefix('#') {
        if !pattern(HASHTAG_PATTERN)?.is_match(tag) {
            return Err(Error::Usage(format!("Invalid hashtag: '#{}'", tag)));
        }
        return Ok(Target::Hashtag(tag.to_string()));
    }
    if let Some(shortcode) = input.strip_prefix(':') {
        return parse_shortcode(shortcode).map(Target::Post);
    }
    if input.eq_ignore_ascii_case("saved") {
        return Ok(Target::Saved);
    }
    if input.starts_with("http://") || input.starts_with("https://") {
        return parse_shortcode(input).map(Target::Post);
    }

    Err(Error::Usage(format!(
        "Unrecognised target '{}'. Use @user, #tag, :shortcode or saved",
        input
    )))
}
