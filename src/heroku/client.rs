use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const HEROKU_ACCEPT: &str = "application/vnd.heroku+json; version=3";
/// Newest releases first, one small page. Without it the API pages ascending.
const RELEASES_RANGE: &str = "version ..; order=desc, max=10";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Heroku API returned non-success status: {status}. Body: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Failed to decode Heroku API response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dyno {
    pub name: String,
    #[serde(rename = "type")]
    pub dyno_type: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseUser {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub version: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user: Option<ReleaseUser>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedRef {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Owner {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Addon {
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub plan: Option<NamedRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppInfo {
    pub name: String,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub region: Option<NamedRef>,
    #[serde(default)]
    pub stack: Option<NamedRef>,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Formation {
    #[serde(rename = "type")]
    pub process_type: String,
    pub quantity: u32,
    pub size: String,
}

/// Thin client for the Heroku Platform API.
#[derive(Clone)]
pub struct HerokuClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HerokuClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn request(&self, endpoint: &str, range: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, range = ?range, "Heroku API request.");

        let builder = self
            .client
            .get(url)
            .header(header::ACCEPT, HEROKU_ACCEPT)
            .bearer_auth(&self.api_key);
        match range {
            Some(range) => builder.header(header::RANGE, range),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, FetchError> {
        self.get_range(endpoint, None).await
    }

    async fn get_range<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        range: Option<&str>,
    ) -> Result<T, FetchError> {
        let response = self.request(endpoint, range).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(FetchError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }

    pub async fn get_app_info(&self, app_name: &str) -> Result<AppInfo, FetchError> {
        self.get(&format!("/apps/{app_name}")).await
    }

    pub async fn get_dynos(&self, app_name: &str) -> Result<Vec<Dyno>, FetchError> {
        self.get(&format!("/apps/{app_name}/dynos")).await
    }

    /// Releases, newest first.
    pub async fn get_releases(&self, app_name: &str) -> Result<Vec<Release>, FetchError> {
        let mut releases: Vec<Release> = self
            .get_range(&format!("/apps/{app_name}/releases"), Some(RELEASES_RANGE))
            .await?;
        releases.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(releases)
    }

    pub async fn get_addons(&self, app_name: &str) -> Result<Vec<Addon>, FetchError> {
        self.get(&format!("/apps/{app_name}/addons")).await
    }

    /// Config vars as returned; callers should only look at the keys.
    pub async fn get_config_vars(
        &self,
        app_name: &str,
    ) -> Result<BTreeMap<String, serde_json::Value>, FetchError> {
        self.get(&format!("/apps/{app_name}/config-vars")).await
    }

    pub async fn get_formation(&self, app_name: &str) -> Result<Vec<Formation>, FetchError> {
        self.get(&format!("/apps/{app_name}/formation")).await
    }
}
