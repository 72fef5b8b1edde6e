//! Entry point tying the client, the session and the listings together.

use std::sync::Arc;

use crate::api::client::FetchClient;
use crate::api::endpoints::Listing;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Comment, Post, Profile, Record};
use crate::pipeline::{materialize, ItemSequence, Paginator};
use crate::session::{Authenticator, SessionHandle, SessionStore};

/// Lookups and listings over one shared session.
pub struct Scraper {
    config: Config,
    client: Arc<FetchClient>,
    authenticator: Arc<Authenticator>,
}

impl Scraper {
    /// Build a scraper from configuration, storing sessions under the
    /// configured data directory.
    pub fn new(config: Config) -> Result<Self> {
        let client = Arc::new(FetchClient::from_config(&config.network)?);
        let store = SessionStore::new(config.app_paths()?.sessions_dir());
        Ok(Self::with_client(config, client, store))
    }

    pub fn with_client(config: Config, client: Arc<FetchClient>, store: SessionStore) -> Self {
        let authenticator = Authenticator::new(Arc::clone(&client), store, SessionHandle::anonymous());
        Self {
            config,
            client,
            authenticator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &Arc<FetchClient> {
        &self.client
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }

    pub fn handle(&self) -> &SessionHandle {
        self.authenticator.handle()
    }

    /// Install the stored session of the current account, if any.
    pub async fn resume(&self) -> Result<bool> {
        Ok(self.authenticator.restore_current().await?.is_some())
    }

    pub async fn profile(&self, username: &str) -> Result<Profile> {
        materialize(&self.client, self.handle(), Profile::from_username(username)).await
    }

    pub async fn post(&self, shortcode: &str) -> Result<Post> {
        materialize(&self.client, self.handle(), Post::from_shortcode(shortcode)).await
    }

    /// Profile of the logged in user.
    pub async fn me(&self) -> Result<Profile> {
        let session = self
            .handle()
            .current()
            .await
            .filter(|s| s.is_authenticated())
            .ok_or(Error::AuthenticationRequired)?;
        self.profile(&session.account).await
    }

    /// A sequence over `listing` set up from the `[preload]` configuration.
    pub fn sequence<R: Record>(&self, listing: Listing) -> Result<ItemSequence<R>> {
        let paginator = Paginator::new(Arc::clone(&self.client), self.handle().clone(), listing)
            .page_size(self.config.preload.page_size);
        let mut sequence = ItemSequence::new(Arc::clone(&self.client), self.handle().clone(), paginator);
        sequence.options(self.config.preload.options())?;
        Ok(sequence)
    }

    pub fn timeline(&self, profile: &Profile) -> Result<ItemSequence<Post>> {
        self.sequence(Listing::Timeline {
            user_id: profile.id.clone(),
        })
    }

    pub fn tagged(&self, profile: &Profile) -> Result<ItemSequence<Post>> {
        self.sequence(Listing::Tagged {
            user_id: profile.id.clone(),
        })
    }

    pub fn igtv(&self, profile: &Profile) -> Result<ItemSequence<Post>> {
        self.sequence(Listing::Igtv {
            user_id: profile.id.clone(),
        })
    }

    pub fn followers(&self, profile: &Profile) -> Result<ItemSequence<Profile>> {
        self.sequence(Listing::Followers {
            user_id: profile.id.clone(),
        })
    }

    pub fn followings(&self, profile: &Profile) -> Result<ItemSequence<Profile>> {
        self.sequence(Listing::Followings {
            user_id: profile.id.clone(),
        })
    }

    /// Users who liked `post`.
    pub fn likes(&self, post: &Post) -> Result<ItemSequence<Profile>> {
        self.sequence(Listing::Likes {
            shortcode: post.shortcode.clone(),
        })
    }

    pub fn comments(&self, post: &Post) -> Result<ItemSequence<Comment>> {
        self.sequence(Listing::Comments {
            shortcode: post.shortcode.clone(),
        })
    }

    /// Most recent posts of a hashtag.
    pub fn hashtag(&self, tag: &str) -> Result<ItemSequence<Post>> {
        self.sequence(Listing::HashtagRecent {
            tag: tag.to_string(),
        })
    }

    /// Top posts of a hashtag, at most one page.
    pub fn hashtag_top(&self, tag: &str) -> Result<ItemSequence<Post>> {
        self.sequence(Listing::HashtagTop {
            tag: tag.to_string(),
        })
    }

    /// Saved posts of the logged in user.
    pub async fn saved(&self) -> Result<ItemSequence<Post>> {
        let session = self
            .handle()
            .current()
            .await
            .filter(|s| s.is_authenticated())
            .ok_or(Error::AuthenticationRequired)?;
        let user_id = match session.user_id {
            Some(id) => id,
            None => self.me().await?.id,
        };
        self.sequence(Listing::Saved { user_id })
    }
}
