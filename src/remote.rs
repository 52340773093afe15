//! Remote configuration: the category feed and the policy document.
//!
//! Both endpoints are plain JSON over HTTP GET. The [`RemoteConfigSource`]
//! trait lets tests and alternative backends replace the `reqwest` client.

use crate::config::settings::RemoteSettings;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// One entry of the remote category feed.
///
/// Every field is optional on the wire so a single malformed entry does not
/// reject the whole feed. Incomplete entries are skipped during the merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteCategory {
    /// Category name, the merge key
    pub name: Option<String>,
    /// Icon reference
    pub icon: Option<String>,
    /// Color reference
    pub color: Option<String>,
}

impl RemoteCategory {
    /// Builds a complete entry.
    #[must_use]
    pub fn new(name: &str, icon: &str, color: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            icon: Some(icon.to_string()),
            color: Some(color.to_string()),
        }
    }
}

/// Body of the categories endpoint: `{"categories": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryFeed {
    /// Feed entries
    pub categories: Vec<RemoteCategory>,
}

/// One titled section of the privacy policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicySection {
    /// Section heading
    pub title: String,
    /// Section body
    pub content: String,
}

/// Body of the policy endpoint: `{"sections": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyDocument {
    /// Sections in display order
    pub sections: Vec<PolicySection>,
}

/// Parses a category feed body.
pub fn parse_category_feed(body: &str) -> Result<Vec<RemoteCategory>> {
    let feed: CategoryFeed = serde_json::from_str(body)?;
    Ok(feed.categories)
}

/// Parses a policy document body.
pub fn parse_policy_document(body: &str) -> Result<PolicyDocument> {
    Ok(serde_json::from_str(body)?)
}

/// Source of remote configuration.
#[async_trait]
pub trait RemoteConfigSource: Send + Sync {
    /// Fetches the category feed.
    async fn fetch_categories(&self) -> Result<Vec<RemoteCategory>>;

    /// Fetches the privacy policy.
    async fn fetch_policy(&self) -> Result<PolicyDocument>;
}

/// `reqwest` backed [`RemoteConfigSource`].
#[derive(Debug, Clone)]
pub struct HttpRemoteConfig {
    client: Client,
    categories_url: Option<String>,
    policy_url: Option<String>,
}

impl HttpRemoteConfig {
    /// Builds a client from the `[remote]` settings.
    pub fn new(settings: &RemoteSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            categories_url: settings.categories_url.clone(),
            policy_url: settings.policy_url.clone(),
        })
    }

    async fn get_text(&self, url: Option<&str>, what: &str) -> Result<String> {
        let url = url.ok_or_else(|| Error::Config {
            message: format!("No {what} URL configured"),
        })?;

        debug!("Fetching {what} from {url}");
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

#[async_trait]
impl RemoteConfigSource for HttpRemoteConfig {
    async fn fetch_categories(&self) -> Result<Vec<RemoteCategory>> {
        let body = self
            .get_text(self.categories_url.as_deref(), "categories")
            .await?;
        parse_category_feed(&body)
    }

    async fn fetch_policy(&self) -> Result<PolicyDocument> {
        let body = self.get_text(self.policy_url.as_deref(), "policy").await?;
        parse_policy_document(&body)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_category_feed_keeps_incomplete_entries() {
        let body = r##"{
            "categories": [
                {"name": "Coffee", "icon": "cup.and.saucer", "color": "#6F4E37"},
                {"name": "Books", "icon": "book"}
            ]
        }"##;

        let categories = parse_category_feed(body).unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(
            categories[0],
            RemoteCategory::new("Coffee", "cup.and.saucer", "#6F4E37")
        );
        assert_eq!(categories[1].color, None);
    }

    #[test]
    fn test_parse_category_feed_requires_categories_key() {
        let result = parse_category_feed(r#"{"items": []}"#);
        assert!(matches!(result.unwrap_err(), Error::Json(_)));

        let result = parse_category_feed("not json");
        assert!(matches!(result.unwrap_err(), Error::Json(_)));
    }

    #[test]
    fn test_parse_policy_document() {
        let body = r#"{"sections": [{"title": "Data", "content": "Stays on device."}]}"#;
        let policy = parse_policy_document(body).unwrap();
        assert_eq!(policy.sections.len(), 1);
        assert_eq!(policy.sections[0].title, "Data");
    }

    #[tokio::test]
    async fn test_missing_url_is_config_error() {
        let remote = HttpRemoteConfig::new(&RemoteSettings::default()).unwrap();

        let result = remote.fetch_categories().await;
        assert!(matches!(result.unwrap_err(), Error::Config { .. }));

        let result = remote.fetch_policy().await;
        assert!(matches!(result.unwrap_err(), Error::Config { .. }));
    }
}
