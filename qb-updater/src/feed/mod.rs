mod models;
pub use models::*;

use crate::error::UpdaterError;
use crate::orchestrator::ReleaseSource;
use crate::product::ProductProfile;
use crate::ui::UiHandle;
use crate::version::ProductVersion;
use regex::Regex;
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use std::time::Duration;

/// Prepare the HTTP client shared by feed lookups and downloads.
pub fn http_client() -> Result<Client, UpdaterError> {
    let client = Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .redirect(Policy::limited(10))
        .connect_timeout(Duration::from_secs(30))
        .hickory_dns(true)
        .build()?;

    Ok(client)
}

/// Looks up the newest release of the product in the remote feed.
#[derive(Debug, Clone)]
pub struct ReleaseResolver {
    client: Client,
    feed_url: Url,
    platform: String,
    pattern: Regex,
    ui: UiHandle,
}

impl ReleaseResolver {
    pub fn new(
        client: Client,
        feed_url: Url,
        platform: impl Into<String>,
        profile: &ProductProfile,
        ui: UiHandle,
    ) -> Result<Self, UpdaterError> {
        Ok(Self {
            client,
            feed_url,
            platform: platform.into(),
            pattern: profile.installer_pattern()?,
            ui,
        })
    }

    #[tracing::instrument(skip(self), fields(feed = self.feed_url.as_str()))]
    pub async fn fetch_latest(&self) -> Result<ReleaseInfo, UpdaterError> {
        let response = self
            .client
            .get(self.feed_url.clone())
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        parse_release(&body, &self.platform, &self.pattern)
    }
}

impl ReleaseSource for ReleaseResolver {
    async fn resolve_latest(&self) -> Option<ReleaseInfo> {
        match self.fetch_latest().await {
            Ok(release) => {
                tracing::info!("Latest release is {} ({})", release.version, release.filename);
                Some(release)
            }
            Err(err) => {
                tracing::error!("Failed to resolve latest release: {}", err);
                self.ui
                    .show_error(format!("Error checking for updates: {}", err));
                None
            }
        }
    }
}

/// Extract the release of `platform` from a feed document.
pub fn parse_release(
    body: &str,
    platform: &str,
    pattern: &Regex,
) -> Result<ReleaseInfo, UpdaterError> {
    let document: FeedDocument = serde_json::from_str(body)?;

    let branch = document
        .platform_releases
        .ok_or(UpdaterError::MissingField("platform_releases"))?
        .remove(platform)
        .ok_or(UpdaterError::MissingField("platform release"))?;

    let release: FeedRelease = serde_json::from_value(branch)?;
    let filename = release
        .filename
        .ok_or(UpdaterError::MissingField("filename"))?;
    let url = release.url.ok_or(UpdaterError::MissingField("url"))?;

    let captures = pattern
        .captures(&filename)
        .ok_or_else(|| UpdaterError::UnexpectedFilename(filename.clone()))?;

    let segment = |idx: usize| {
        captures[idx]
            .parse::<u64>()
            .map_err(|_| UpdaterError::InvalidVersion(filename.clone()))
    };
    let version = ProductVersion::new(segment(1)?, segment(2)?, segment(3)?);

    let download_url = Url::parse(&url)?;

    Ok(ReleaseInfo {
        version,
        download_url,
        filename,
    })
}
