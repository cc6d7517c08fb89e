use crate::version::ProductVersion;
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;

/// Only the releases per platform are of interest. Branches are kept as raw
/// JSON so an odd entry for another platform does not spoil the document.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedDocument {
    pub platform_releases: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedRelease {
    pub filename: Option<String>,
    pub url: Option<String>,
}

/// The newest published release, as resolved from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub version: ProductVersion,
    pub download_url: Url,
    pub filename: String,
}
