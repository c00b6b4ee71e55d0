//! HTTP client for the token and rules-listing endpoints.

use reqwest::Url;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::{ClientError, Result};
use crate::source::RuleSource;
use crate::types::{AccessToken, Credentials, PageToken, RulesPage, TokenResponse};

/// Number of rules requested per page.
pub const PAGE_SIZE: u32 = 100;

const TOKEN_PATH: &str = "/oauth/token";
const RULES_PATH: &str = "/v2/edr-rules";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// User agent string for API requests.
const USER_AGENT_VALUE: &str = concat!("edr-rules-db/", env!("CARGO_PKG_VERSION"));

/// Client for the rules provider.
///
/// Holds one connection pool for the whole run. No timeouts or retries are
/// configured.
#[derive(Debug, Clone)]
pub struct EdrClient {
    client: reqwest::Client,
    host: String,
    token_host: String,
}

impl EdrClient {
    /// Creates a client for the given API and token hosts.
    ///
    /// # Arguments
    /// * `host` - Base URL of the rules API (e.g. `https://api.example.com`)
    /// * `token_host` - Base URL of the OAuth token service
    pub fn new(host: impl Into<String>, token_host: impl Into<String>) -> Result<Self> {
        let host = base_url(&host.into())?;
        let token_host = base_url(&token_host.into())?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::HttpClient {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            host,
            token_host,
        })
    }

    /// Obtains an access token with the password grant.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AccessToken> {
        let url = format!("{}{TOKEN_PATH}", self.token_host);

        tracing::debug!("Requesting access token from {}", url);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(token_request_body(credentials))
            .send()
            .await
            .map_err(|e| ClientError::auth(e.to_string()))?;
        let response = check_status(response).await.map_err(ClientError::auth)?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::auth(format!("invalid token response: {e}")))?;

        Ok(AccessToken::new(token.access_token))
    }

    /// Fetches one page of rules.
    pub async fn fetch_page(
        &self,
        token: &AccessToken,
        page_token: &PageToken,
    ) -> Result<RulesPage> {
        let url = rules_page_url(&self.host, page_token)?;

        tracing::debug!("Fetching rules page from {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| ClientError::fetch(e.to_string()))?;
        let response = check_status(response).await.map_err(ClientError::fetch)?;

        let page: RulesPage = response
            .json()
            .await
            .map_err(|e| ClientError::fetch(format!("invalid rules page: {e}")))?;

        tracing::debug!(
            rules = page.rules.len(),
            next_page_token = %page.next_page_token,
            "Fetched rules page"
        );

        Ok(page)
    }

    /// Binds an access token to a handle sharing this client's pool.
    #[must_use]
    pub fn with_token(&self, token: AccessToken) -> AuthenticatedClient {
        AuthenticatedClient {
            client: self.clone(),
            token,
        }
    }

    /// Releases the connection pool.
    ///
    /// Handles returned by [`Self::with_token`] keep the pool alive until
    /// they are dropped as well.
    pub fn close(self) {
        tracing::info!("Closing");
    }
}

/// A client holding the run's access token.
#[derive(Debug)]
pub struct AuthenticatedClient {
    client: EdrClient,
    token: AccessToken,
}

impl RuleSource for AuthenticatedClient {
    async fn fetch_page(&self, page_token: &PageToken) -> Result<RulesPage> {
        self.client.fetch_page(&self.token, page_token).await
    }
}

/// Builds the form body of the password-grant token request.
///
/// Each value is percent-encoded on its own, `/` included, so `&` and `=`
/// in a username or password cannot split the form.
#[must_use]
pub fn token_request_body(credentials: &Credentials) -> String {
    format!(
        "grant_type=password&username={}&password={}",
        urlencoding::encode(&credentials.username),
        urlencoding::encode(credentials.password()),
    )
}

/// Builds the listing URL for a page.
///
/// `pageToken` is only sent for pages after the first.
pub fn rules_page_url(host: &str, page_token: &PageToken) -> Result<Url> {
    let raw = format!("{}{RULES_PATH}", host.trim_end_matches('/'));
    let mut url = Url::parse(&raw).map_err(|e| ClientError::InvalidUrl {
        url: raw.clone(),
        message: e.to_string(),
    })?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("pageSize", &PAGE_SIZE.to_string());
        if !page_token.is_empty() {
            query.append_pair("pageToken", page_token.as_str());
        }
    }

    Ok(url)
}

/// Validates a base URL and strips trailing slashes.
fn base_url(url: &str) -> Result<String> {
    Url::parse(url).map_err(|e| ClientError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    Ok(url.trim_end_matches('/').to_string())
}

/// Turns a non-success status into an error message carrying the body.
async fn check_status(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(format!("server returned {status}: {body}"))
}
