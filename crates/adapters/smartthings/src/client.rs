//! Async HTTP client for the SmartThings REST API.
//!
//! Base path: `https://api.smartthings.com/v1/`
//! Auth: `Authorization: Bearer <token>` header

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::SmartThingsError;
use crate::types::{
    CommandsRequest, CommandsResponse, ErrorEnvelope, Page, StCommand, StDevice, StDeviceStatus,
    StHealth, StLocation, StRoom, StScene,
};

/// Upper bound on followed `_links.next` pages for one listing.
const MAX_PAGES: usize = 100;

/// Async client for the SmartThings REST API.
#[derive(Debug)]
pub struct SmartThingsClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SmartThingsClient {
    /// Build a client that sends `token` as a bearer credential on every
    /// request.
    pub fn new(
        base_url: Url,
        token: &SecretString,
        timeout: Duration,
    ) -> Result<Self, SmartThingsError> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| SmartThingsError::InvalidToken)?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .user_agent(concat!("omnihub/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base_url })
    }

    // ── URL builder ──────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, SmartThingsError> {
        Ok(self.base_url.join(path)?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, SmartThingsError> {
        debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        Self::handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, SmartThingsError> {
        let url = self.url(path)?;
        debug!("POST {url}");
        let resp = self.http.post(url).json(body).send().await?;
        Self::handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, SmartThingsError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            // Some endpoints answer 200 with an empty body.
            let text = if body.trim().is_empty() { "{}" } else { &body };
            serde_json::from_str(text).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                SmartThingsError::Decode {
                    message: format!("{e} (body preview: {preview:?})"),
                    body: body.clone(),
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: StatusCode, resp: reqwest::Response) -> SmartThingsError {
        let retry_after = retry_after(resp.headers());
        let raw = resp.text().await.unwrap_or_default();

        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&raw) {
            Ok(envelope) => {
                debug!(request_id = ?envelope.request_id, "SmartThings error response");
                (
                    envelope.error.code,
                    envelope.error.message.unwrap_or_else(|| status.to_string()),
                )
            }
            Err(_) if raw.is_empty() => (None, status.to_string()),
            Err(_) => (None, raw),
        };
        SmartThingsError::Api {
            status: status.as_u16(),
            code,
            message,
            retry_after,
        }
    }

    /// Collect every page of a listing by following `_links.next.href`.
    async fn get_all<T: DeserializeOwned>(&self, first: Url) -> Result<Vec<T>, SmartThingsError> {
        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;
        while let Some(url) = next.take() {
            let page: Page<T> = self.get(url).await?;
            items.extend(page.items);
            pages += 1;
            if pages >= MAX_PAGES {
                debug!(pages, "stopping pagination at page limit");
                break;
            }
            next = match page.links.and_then(|links| links.next) {
                Some(href) => Some(Url::parse(&href.href)?),
                None => None,
            };
        }
        Ok(items)
    }

    // ── Devices ──────────────────────────────────────────────────────

    pub async fn list_devices(
        &self,
        location_id: Option<&str>,
    ) -> Result<Vec<StDevice>, SmartThingsError> {
        let mut url = self.url("devices")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("includeHealth", "true");
            if let Some(location_id) = location_id {
                query.append_pair("locationId", location_id);
            }
        }
        self.get_all(url).await
    }

    pub async fn get_device(&self, device_id: &str) -> Result<StDevice, SmartThingsError> {
        self.get(self.url(&format!("devices/{device_id}"))?).await
    }

    pub async fn device_status(&self, device_id: &str) -> Result<StDeviceStatus, SmartThingsError> {
        self.get(self.url(&format!("devices/{device_id}/status"))?)
            .await
    }

    pub async fn device_health(&self, device_id: &str) -> Result<StHealth, SmartThingsError> {
        self.get(self.url(&format!("devices/{device_id}/health"))?)
            .await
    }

    pub async fn execute_commands(
        &self,
        device_id: &str,
        commands: Vec<StCommand>,
    ) -> Result<CommandsResponse, SmartThingsError> {
        self.post(
            &format!("devices/{device_id}/commands"),
            &CommandsRequest { commands },
        )
        .await
    }

    // ── Locations, rooms, scenes ─────────────────────────────────────

    pub async fn list_locations(&self) -> Result<Vec<StLocation>, SmartThingsError> {
        self.get_all(self.url("locations")?).await
    }

    pub async fn list_rooms(&self, location_id: &str) -> Result<Vec<StRoom>, SmartThingsError> {
        self.get_all(self.url(&format!("locations/{location_id}/rooms"))?)
            .await
    }

    pub async fn list_scenes(
        &self,
        location_id: Option<&str>,
    ) -> Result<Vec<StScene>, SmartThingsError> {
        let mut url = self.url("scenes")?;
        if let Some(location_id) = location_id {
            url.query_pairs_mut().append_pair("locationId", location_id);
        }
        self.get_all(url).await
    }

    pub async fn execute_scene(&self, scene_id: &str) -> Result<(), SmartThingsError> {
        let _: serde_json::Value = self
            .post(&format!("scenes/{scene_id}/execute"), &serde_json::json!({}))
            .await?;
        Ok(())
    }
}

/// `Retry-After` in seconds, else `X-RateLimit-Reset` in milliseconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
    };
    header(RETRY_AFTER.as_str())
        .map(Duration::from_secs)
        .or_else(|| header("x-ratelimit-reset").map(Duration::from_millis))
}
