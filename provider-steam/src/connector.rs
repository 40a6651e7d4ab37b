//! Steam Web API connector
//!
//! Implements [`ProfileSource`] with `ISteamUser/GetPlayerSummaries/v0002`.
//! The endpoint accepts at most 100 ids per call and silently omits ids it
//! does not know.

use async_trait::async_trait;
use bridge_traits::{
    fetch_json, FetchError, HttpClient, HttpRequest, ProfileSource, ProfileSummary, RetryPolicy,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SteamError};

/// Steam Web API base URL
pub const STEAM_API: &str = "https://api.steampowered.com";

/// Largest number of ids per summaries call
pub const MAX_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
struct SummariesEnvelope {
    response: SummariesResponse,
}

#[derive(Debug, Deserialize)]
struct SummariesResponse {
    #[serde(default)]
    players: Vec<PlayerSummary>,
}

#[derive(Debug, Deserialize)]
struct PlayerSummary {
    steamid: String,

    #[serde(default)]
    personaname: String,

    #[serde(default)]
    avatarhash: Option<String>,
}

/// Steam player summaries client
///
/// # Example
///
/// ```ignore
/// use provider_steam::SteamProfiles;
///
/// let profiles = SteamProfiles::new(http_client, RetryPolicy::default(), api_key);
/// let summaries = profiles.fetch_profiles(&[76561197960265729]).await?;
/// ```
pub struct SteamProfiles {
    http_client: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    api_key: String,
    base_url: String,
}

impl SteamProfiles {
    pub fn new(http_client: Arc<dyn HttpClient>, retry: RetryPolicy, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            retry,
            api_key: api_key.into(),
            base_url: STEAM_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch summaries for up to [`MAX_BATCH`] ids.
    #[instrument(skip(self, steamids), fields(count = steamids.len()))]
    pub async fn player_summaries(&self, steamids: &[u64]) -> Result<Vec<ProfileSummary>> {
        if self.api_key.is_empty() {
            return Err(SteamError::MissingApiKey);
        }

        let ids = steamids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let request = HttpRequest::get(format!(
            "{}/ISteamUser/GetPlayerSummaries/v0002/",
            self.base_url
        ))
        .header("Accept", "application/json")
        .query("key", &self.api_key)
        .query("steamids", ids);

        let envelope: SummariesEnvelope =
            fetch_json(self.http_client.as_ref(), request, &self.retry).await?;

        let profiles = envelope
            .response
            .players
            .into_iter()
            .filter_map(|player| match player.steamid.parse::<u64>() {
                Ok(steamid64) => Some(ProfileSummary {
                    steamid64,
                    display_name: player.personaname,
                    avatar_hash: player.avatarhash.filter(|hash| !hash.is_empty()),
                }),
                Err(_) => {
                    warn!(steamid = %player.steamid, "Ignoring summary with malformed steamid");
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!(requested = steamids.len(), returned = profiles.len(), "Fetched player summaries");
        Ok(profiles)
    }
}

#[async_trait]
impl ProfileSource for SteamProfiles {
    fn max_batch(&self) -> usize {
        MAX_BATCH
    }

    async fn fetch_profiles(&self, steamids: &[u64]) -> std::result::Result<Vec<ProfileSummary>, FetchError> {
        let mut profiles = Vec::with_capacity(steamids.len());
        for chunk in steamids.chunks(MAX_BATCH) {
            profiles.extend(self.player_summaries(chunk).await?);
        }
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::HttpResponse;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn query<'a>(request: &'a HttpRequest, key: &str) -> Option<&'a str> {
        request
            .query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn profiles(mock_http: MockHttpClient, key: &str) -> SteamProfiles {
        SteamProfiles::new(Arc::new(mock_http), RetryPolicy::default(), key)
            .with_base_url("https://steam.example.test")
    }

    #[tokio::test]
    async fn test_fetch_profiles_parses_summaries() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| {
                request.url == "https://steam.example.test/ISteamUser/GetPlayerSummaries/v0002/"
                    && query(request, "key") == Some("secret")
                    && query(request, "steamids") == Some("76561197960265729,76561197960265730")
                    && !request.display_url().contains("secret")
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"response": {"players": [
                        {"steamid": "76561197960265730", "personaname": "second", "avatarhash": "ab12"},
                        {"steamid": "76561197960265729", "personaname": "first", "avatarhash": ""}
                    ]}}"#,
                ))
            });

        let summaries = profiles(mock_http, "secret")
            .fetch_profiles(&[76_561_197_960_265_729, 76_561_197_960_265_730])
            .await
            .unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].steamid64, 76_561_197_960_265_730);
        assert_eq!(summaries[0].avatar_hash.as_deref(), Some("ab12"));
        assert_eq!(summaries[1].display_name, "first");
        assert_eq!(summaries[1].avatar_hash, None);
    }

    #[tokio::test]
    async fn test_large_requests_are_split() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| {
                query(request, "steamids").is_some_and(|ids| ids.split(',').count() <= MAX_BATCH)
            })
            .times(2)
            .returning(|_| Ok(response(200, r#"{"response": {"players": []}}"#)));

        let ids: Vec<u64> = (1..=150).map(|n| 76_561_197_960_265_728 + n).collect();
        let summaries = profiles(mock_http, "secret").fetch_profiles(&ids).await.unwrap();

        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn test_forbidden_key_is_fatal() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(403, "Forbidden")));

        let err = profiles(mock_http, "revoked")
            .fetch_profiles(&[76_561_197_960_265_729])
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(403));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(0);

        let err = profiles(mock_http, "")
            .fetch_profiles(&[76_561_197_960_265_729])
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_max_batch() {
        assert_eq!(profiles(MockHttpClient::new(), "k").max_batch(), 100);
    }
}
