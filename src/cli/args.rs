//! Command-line argument definitions using clap.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::Config;

/// Instagram scraper CLI.
#[derive(Parser, Debug)]
#[command(
    name = "instascrape",
    version,
    about = "Scrape and download Instagram posts and profiles",
    long_about = "A CLI tool to download posts, profile pictures and listings from Instagram.\n\n\
                  Targets are written as @user, #hashtag, :shortcode or saved."
)]
pub struct Args {
    /// Enable debug logging.
    #[arg(short, long)]
    pub debug: bool,

    /// Path to configuration file [default: ~/.instascrape/config.toml].
    #[arg(long, env = "INSTASCRAPE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session.
    Login(LoginArgs),

    /// Forget the current session.
    Logout(LogoutArgs),

    /// Manage stored sessions.
    Cookies(CookiesArgs),

    /// Show the logged in account.
    Whoami,

    /// Print or save profile, post or listing information.
    Dump(DumpArgs),

    /// Download posts of one or more targets.
    #[command(alias = "down")]
    Download(DownloadArgs),
}

#[derive(ClapArgs, Debug)]
pub struct LoginArgs {
    /// Account username.
    #[arg(short, long, env = "INSTASCRAPE_USERNAME")]
    pub username: Option<String>,

    /// Account password. Prompted when missing.
    #[arg(short, long, env = "INSTASCRAPE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct LogoutArgs {
    /// Log out on the server and delete the stored session.
    #[arg(short, long)]
    pub real: bool,
}

#[derive(ClapArgs, Debug)]
pub struct CookiesArgs {
    #[command(subcommand)]
    pub action: Option<CookiesAction>,
}

#[derive(Subcommand, Debug)]
pub enum CookiesAction {
    /// List stored sessions (default).
    List,

    /// Store the current session again.
    Save,

    /// Delete stored sessions.
    #[command(alias = "rm")]
    Remove {
        /// Accounts to remove.
        #[arg(required = true)]
        accounts: Vec<String>,
    },
}

/// Options shared by commands that walk listings.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ListingArgs {
    /// Maximum number of items per listing.
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Fetch full items ahead of consumption.
    #[arg(long)]
    pub preload: bool,

    /// Number of preload workers.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Filter expression, e.g. "likes_count > 100". Repeat to combine.
    #[arg(short = 'F', long = "filter")]
    pub filters: Vec<String>,
}

#[derive(ClapArgs, Debug)]
pub struct DumpArgs {
    /// @user or :shortcode.
    pub target: String,

    /// Dump the followers of a profile.
    #[arg(long, conflicts_with_all = ["followings", "likes", "comments"])]
    pub followers: bool,

    /// Dump the followings of a profile.
    #[arg(long, conflicts_with_all = ["likes", "comments"])]
    pub followings: bool,

    /// Dump the likers of a post.
    #[arg(long, conflicts_with = "comments")]
    pub likes: bool,

    /// Dump the comments of a post.
    #[arg(long)]
    pub comments: bool,

    /// Write JSON to this file instead of printing.
    #[arg(short, long)]
    pub outfile: Option<PathBuf>,

    #[command(flatten)]
    pub listing: ListingArgs,
}

#[derive(ClapArgs, Debug)]
pub struct DownloadArgs {
    /// Targets: @user, #hashtag, :shortcode or saved.
    #[arg(required = true)]
    pub targets: Vec<String>,

    /// Base directory for downloads.
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Timeline posts of profiles (default when no listing is chosen).
    #[arg(long)]
    pub timeline: bool,

    /// Posts a profile is tagged in.
    #[arg(long)]
    pub tagged: bool,

    /// IGTV videos of profiles.
    #[arg(long)]
    pub igtv: bool,

    /// Profile pictures.
    #[arg(long)]
    pub pic: bool,

    /// Top posts of hashtags.
    #[arg(long)]
    pub top: bool,

    /// Recent posts of hashtags (default when --top is not given).
    #[arg(long)]
    pub recent: bool,

    /// Write a JSON sidecar next to each post.
    #[arg(long)]
    pub dump_metadata: bool,

    /// Add each post's comments to the sidecar.
    #[arg(long)]
    pub dump_comments: bool,

    /// Add the usernames of each post's likers to the sidecar.
    #[arg(long)]
    pub dump_likes: bool,

    /// Stop at the first failed post.
    #[arg(long)]
    pub fail_fast: bool,

    /// Compare existing files by size only.
    #[arg(long)]
    pub no_verify: bool,

    /// Hide progress bars.
    #[arg(short, long)]
    pub quiet: bool,

    #[command(flatten)]
    pub listing: ListingArgs,
}

impl ListingArgs {
    /// Override `[preload]` settings where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(workers) = self.workers {
            config.preload.workers = workers;
        }
    }
}

impl DownloadArgs {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(dest) = &self.dest {
            config.download.dest = Some(dest.clone());
        }

        // Boolean flags (only override if set to non-default)
        if self.dump_metadata {
            config.download.dump_metadata = true;
        }

        if self.dump_comments {
            config.download.dump_comments = true;
        }

        if self.dump_likes {
            config.download.dump_likes = true;
        }

        if self.fail_fast {
            config.download.fail_fast = true;
        }

        if self.no_verify {
            config.download.verify = false;
        }

        if self.quiet {
            config.download.show_progress = false;
        }

        self.listing.merge_into_config(config);
    }

    /// Profile listings requested, timeline when none was chosen.
    pub fn profile_listings(&self) -> Vec<&'static str> {
        let mut listings = Vec::new();
        if self.timeline || !(self.tagged || self.igtv || self.pic) {
            listings.push("timeline");
        }
        if self.tagged {
            listings.push("tagged");
        }
        if self.igtv {
            listings.push("igtv");
        }
        listings
    }

    /// Hashtag listings requested, recent when --top was not given.
    pub fn hashtag_listings(&self) -> Vec<&'static str> {
        let mut listings = Vec::new();
        if self.top {
            listings.push("top");
        }
        if self.recent || !self.top {
            listings.push("recent");
        }
        listings
    }
}
