//! Hosted table over PostgREST.
//!
//! Reads and writes go to `<base>/rest/v1/<table>` with the project's anon
//! key; writes ask for `return=representation` so the stored rows come back
//! in the response body. The change feed is the realtime websocket.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use super::realtime::{self, DEFAULT_HEARTBEAT, RealtimeConfig};
use super::row::{RemoteRow, RowWrite};
use super::{ChangeFeed, RemoteError, RemoteStore};
use crate::model::InitiativeId;

/// Connection settings for a hosted project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub base_url: String,
    pub anon_key: String,
    pub table: String,
    pub schema: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Open the realtime change feed on `subscribe`.
    pub realtime: bool,
    /// Wait between change feed reconnect attempts.
    pub reconnect_delay: Duration,
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// PostgREST-backed [`RemoteStore`].
#[derive(Debug, Clone)]
pub struct RestRemote {
    http: reqwest::Client,
    config: RestConfig,
    endpoint: String,
}

fn header(value: &str) -> Result<HeaderValue, RemoteError> {
    HeaderValue::from_str(value)
        .map_err(|err| RemoteError::Transport(format!("invalid header value: {err}")))
}

impl RestRemote {
    /// Build the HTTP client. No request is made.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Transport`] if the key or schema cannot be sent
    /// as a header, or the client cannot be constructed.
    pub fn new(config: RestConfig) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header(&config.anon_key)?);
        headers.insert(AUTHORIZATION, header(&format!("Bearer {}", config.anon_key))?);
        headers.insert("Accept-Profile", header(&config.schema)?);
        headers.insert("Content-Profile", header(&config.schema)?);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;
        let endpoint = format!(
            "{}/rest/v1/{}",
            config.base_url.trim_end_matches('/'),
            urlencoding::encode(&config.table)
        );
        Ok(Self {
            http,
            config,
            endpoint,
        })
    }

    #[must_use]
    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn list_url(&self) -> String {
        format!("{}?select=*&order=created_at.asc", self.endpoint)
    }

    fn row_url(&self, id: &InitiativeId) -> String {
        format!("{}?id=eq.{}", self.endpoint, urlencoding::encode(id.as_str()))
    }

    fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            url: realtime::socket_url(&self.config.base_url, &self.config.anon_key),
            schema: self.config.schema.clone(),
            table: self.config.table.clone(),
            reconnect_delay: self.config.reconnect_delay,
            heartbeat_interval: DEFAULT_HEARTBEAT,
        }
    }
}

async fn read_rows(response: reqwest::Response) -> Result<Vec<RemoteRow>, RemoteError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(RemoteError::Server {
            status: status.as_u16(),
            message,
        });
    }
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl RemoteStore for RestRemote {
    async fn select_all(&self) -> Result<Vec<RemoteRow>, RemoteError> {
        let url = self.list_url();
        debug!(url = %url, "selecting rows");
        let response = self.http.get(&url).send().await?;
        read_rows(response).await
    }

    async fn insert(&self, rows: Vec<RowWrite>) -> Result<Vec<RemoteRow>, RemoteError> {
        debug!(count = rows.len(), "inserting rows");
        let response = self
            .http
            .post(&self.endpoint)
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;
        read_rows(response).await
    }

    async fn update(
        &self,
        id: &InitiativeId,
        row: RowWrite,
    ) -> Result<Option<RemoteRow>, RemoteError> {
        debug!(id = %id, "updating row");
        let response = self
            .http
            .patch(self.row_url(id))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        Ok(read_rows(response).await?.into_iter().next())
    }

    async fn delete(&self, id: &InitiativeId) -> Result<bool, RemoteError> {
        debug!(id = %id, "deleting row");
        let response = self
            .http
            .delete(self.row_url(id))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Ok(!read_rows(response).await?.is_empty())
    }

    async fn subscribe(&self) -> Result<ChangeFeed, RemoteError> {
        if !self.config.realtime {
            return Err(RemoteError::FeedClosed("realtime disabled".into()));
        }
        Ok(realtime::spawn_feed(self.realtime_config()))
    }
}

#[cfg(test)]
mod tests {
    use super::{RestConfig, RestRemote};
    use crate::model::InitiativeId;
    use crate::remote::{RemoteError, RemoteStore};
    use std::time::Duration;

    fn config() -> RestConfig {
        RestConfig {
            base_url: "https://abc.supabase.co/".into(),
            anon_key: "anon".into(),
            table: "initiatives".into(),
            schema: "public".into(),
            timeout: Duration::from_secs(15),
            realtime: false,
            reconnect_delay: Duration::from_secs(5),
        }
    }

    #[test]
    fn builds_postgrest_urls() {
        let remote = RestRemote::new(config()).unwrap();
        assert_eq!(
            remote.list_url(),
            "https://abc.supabase.co/rest/v1/initiatives?select=*&order=created_at.asc"
        );
        assert_eq!(
            remote.row_url(&InitiativeId::from("a b&c")),
            "https://abc.supabase.co/rest/v1/initiatives?id=eq.a%20b%26c"
        );
    }

    #[test]
    fn realtime_points_at_websocket_endpoint() {
        let remote = RestRemote::new(config()).unwrap();
        let rt = remote.realtime_config();
        assert!(rt.url.starts_with("wss://abc.supabase.co/realtime/v1/websocket"));
        assert_eq!(rt.topic(), "realtime:public:initiatives");
    }

    #[test]
    fn rejects_keys_that_cannot_be_headers() {
        let mut bad = config();
        bad.anon_key = "line\nbreak".into();
        assert!(matches!(
            RestRemote::new(bad),
            Err(RemoteError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn subscribe_fails_when_realtime_disabled() {
        let remote = RestRemote::new(config()).unwrap();
        assert!(matches!(
            remote.subscribe().await,
            Err(RemoteError::FeedClosed(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let mut cfg = config();
        cfg.base_url = "http://127.0.0.1:9".into();
        cfg.timeout = Duration::from_secs(2);
        let remote = RestRemote::new(cfg).unwrap();
        assert!(matches!(
            remote.select_all().await,
            Err(RemoteError::Transport(_))
        ));
    }
}
