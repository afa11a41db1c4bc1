use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::logger::{MessageLogMode, MessageLogger};
use crate::types::*;
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.nibeuplink.com";

struct AuthState {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

pub struct UplinkBuilder {
    base_url: String,
    access_token: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    scope: String,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl UplinkBuilder {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
            scope: "READSYSTEM".to_string(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Enable one-shot token refresh on 401 responses.
    pub fn refresh(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Uplink {
        let http = reqwest::Client::builder()
            .build()
            .expect("failed to build HTTP client");

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(
                MessageLogger::new(mode, &path).expect("failed to open log file"),
            )),
            _ => None,
        };

        Uplink {
            http,
            base_url: self.base_url,
            client_id: self.client_id,
            client_secret: self.client_secret,
            scope: self.scope,
            auth: Mutex::new(AuthState {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
            }),
            logger,
        }
    }
}

/// Async REST client for the Nibe Uplink cloud API.
///
/// Carries a bearer token; a 401 triggers at most one refresh-and-retry.
/// No other retry or backoff exists here, resilience is the caller's job.
pub struct Uplink {
    http: reqwest::Client,
    base_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    scope: String,
    auth: Mutex<AuthState>,
    logger: Option<Mutex<MessageLogger>>,
}

impl Uplink {
    pub fn builder(access_token: impl Into<String>) -> UplinkBuilder {
        UplinkBuilder::new(access_token)
    }

    pub async fn get_systems(&self) -> Result<Vec<SystemInfo>> {
        let page: Paged<SystemInfo> = self.get_json("/api/v1/systems", &[]).await?;
        Ok(page.objects)
    }

    pub async fn get_system(&self, system_id: i64) -> Result<SystemInfo> {
        self.get_json(&format!("/api/v1/systems/{system_id}"), &[])
            .await
    }

    pub async fn get_categories(
        &self,
        system_id: i64,
        include_parameters: bool,
        unit_id: i64,
    ) -> Result<Vec<CategoryRecord>> {
        self.get_json(
            &format!("/api/v1/systems/{system_id}/serviceinfo/categories"),
            &[
                ("parameters", include_parameters.to_string()),
                ("systemUnitId", unit_id.to_string()),
            ],
        )
        .await
    }

    pub async fn get_unit_status(&self, system_id: i64, unit_id: i64) -> Result<Vec<StatusRecord>> {
        self.get_json(
            &format!("/api/v1/systems/{system_id}/units/{unit_id}/status"),
            &[],
        )
        .await
    }

    /// Fetch one parameter's current value. The vendor returns a JSON
    /// `null` body for unknown parameters, mapped to `None` here.
    pub async fn get_parameter(
        &self,
        system_id: i64,
        parameter_id: i64,
    ) -> Result<Option<ParameterRecord>> {
        self.get_json(
            &format!("/api/v1/systems/{system_id}/parameters/{parameter_id}"),
            &[],
        )
        .await
    }

    pub async fn get_notifications(&self, system_id: i64) -> Result<Vec<NotificationRecord>> {
        let page: Paged<NotificationRecord> = self
            .get_json(&format!("/api/v1/systems/{system_id}/notifications"), &[])
            .await?;
        Ok(page.objects)
    }

    pub(crate) fn log_notifications(
        &self,
        system_id: i64,
        added: &[&NotificationRecord],
        removed: &[&NotificationRecord],
    ) {
        if let Some(ref logger) = self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_notifications(system_id, added, removed);
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let resp = self.send(path, query).await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED && self.can_refresh() {
            debug!(path, "access token rejected, refreshing");
            self.refresh_access_token().await?;
            let resp = self.send(path, query).await?;
            return Self::decode(resp).await;
        }

        Self::decode(resp).await
    }

    async fn send(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let token = {
            let auth = self.auth.lock().expect("auth state poisoned");
            auth.access_token.clone()
        };

        if let Some(ref logger) = self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_request("GET", path);
        }

        let resp = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(token)
            .send()
            .await?;
        Ok(resp)
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        Ok(resp.json().await?)
    }

    fn can_refresh(&self) -> bool {
        self.client_id.is_some()
            && self.client_secret.is_some()
            && self
                .auth
                .lock()
                .expect("auth state poisoned")
                .refresh_token
                .is_some()
    }

    async fn refresh_access_token(&self) -> Result<()> {
        let (client_id, client_secret, refresh_token) = {
            let auth = self.auth.lock().expect("auth state poisoned");
            match (&self.client_id, &self.client_secret, &auth.refresh_token) {
                (Some(id), Some(secret), Some(token)) => {
                    (id.clone(), secret.clone(), token.clone())
                }
                _ => return Err(Error::Auth("token refresh not configured".to_string())),
            }
        };

        let url = format!("{}/oauth/token", self.base_url);
        let resp = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Auth(format!(
                "token refresh failed with status {}",
                resp.status().as_u16()
            )));
        }

        let token: TokenResponse = resp.json().await?;
        let mut auth = self.auth.lock().expect("auth state poisoned");
        auth.access_token = token.access_token;
        if token.refresh_token.is_some() {
            auth.refresh_token = token.refresh_token;
        }
        Ok(())
    }
}
