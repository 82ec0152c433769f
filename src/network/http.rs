//! HTTP client for the local network-configuration service.
//!
//! Every call is a fresh one-shot request with its own timeout. Failures are
//! logged here once, at `warn`, and returned typed.

use super::error::{Endpoint, NetworkError};
use super::model::{BleName, IpSnapshot, NetworkStatus, WifiApplyResult};
use super::reset::ResetAck;
use super::{logged, NetworkClient};
use crate::config::AgentConfig;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Content type sent with every POST.
const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Client for `http://127.0.0.1:<port>/`.
#[derive(Debug, Clone)]
pub struct HttpNetworkClient {
    http: Client,
    base: String,
    status_timeout: Duration,
    wifi_timeout: Duration,
    reset_timeout: Duration,
}

impl HttpNetworkClient {
    /// Build a client from the agent configuration.
    pub fn new(config: &AgentConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base: config.api_base.clone(),
            status_timeout: config.status_timeout,
            wifi_timeout: config.wifi_timeout,
            reset_timeout: config.reset_timeout,
        })
    }

    /// Absolute URL of `endpoint`.
    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base, endpoint.as_str())
    }

    /// `GET getBleServiceName`. An empty name is returned as-is.
    pub async fn fetch_ble_name(&self) -> Result<String, NetworkError> {
        let name: BleName = self
            .get_json(Endpoint::BleServiceName, self.status_timeout)
            .await
            .map_err(logged)?;
        Ok(name.ble)
    }

    /// `POST factoryResetForBle` with the write payload as body.
    ///
    /// Any 2xx counts as acknowledgment; the body is kept for logging.
    pub async fn factory_reset(&self, payload: &[u8]) -> Result<ResetAck, NetworkError> {
        let body = self
            .post(Endpoint::FactoryReset, payload, self.reset_timeout)
            .await
            .map_err(logged)?;
        Ok(ResetAck {
            detail: String::from_utf8_lossy(&body).trim().to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        timeout: Duration,
    ) -> Result<T, NetworkError> {
        let request = self.http.get(self.url(endpoint));
        let body = self.execute(endpoint, request, timeout).await?;
        decode(endpoint, &body)
    }

    async fn post(
        &self,
        endpoint: Endpoint,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, NetworkError> {
        let request = self
            .http
            .post(self.url(endpoint))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(payload.to_vec());
        self.execute(endpoint, request, timeout).await
    }

    async fn execute(
        &self,
        endpoint: Endpoint,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<Vec<u8>, NetworkError> {
        debug!("{} ...", endpoint);
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpStatus {
                endpoint,
                code: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(endpoint, timeout, e))?;
        Ok(body.to_vec())
    }
}

impl NetworkClient for HttpNetworkClient {
    async fn fetch_ip_snapshot(&self) -> Result<IpSnapshot, NetworkError> {
        let snapshot: IpSnapshot = self
            .get_json(Endpoint::LocalIpAddress, self.status_timeout)
            .await
            .map_err(logged)?;
        debug!("IP snapshot: {:?}", snapshot);
        Ok(snapshot)
    }

    async fn check_internet_health(&self) -> Result<NetworkStatus, NetworkError> {
        let status: NetworkStatus = self
            .get_json(Endpoint::InternetHealth, self.status_timeout)
            .await
            .map_err(logged)?;
        debug!("Internet health: {:?}", status);
        Ok(status)
    }

    async fn apply_wifi_credentials(&self, payload: &[u8]) -> Result<WifiApplyResult, NetworkError> {
        let body = self
            .post(Endpoint::SetupWifi, payload, self.wifi_timeout)
            .await
            .map_err(logged)?;
        let result: WifiApplyResult = decode(Endpoint::SetupWifi, &body).map_err(logged)?;
        debug!("Wi-Fi apply: {:?}", result);
        Ok(result)
    }
}

fn transport_error(endpoint: Endpoint, timeout: Duration, e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Timeout {
            endpoint,
            after: timeout,
        }
    } else {
        NetworkError::Transport {
            endpoint,
            reason: e.to_string(),
        }
    }
}

fn decode<T: DeserializeOwned>(endpoint: Endpoint, body: &[u8]) -> Result<T, NetworkError> {
    serde_json::from_slice(body).map_err(|e| NetworkError::Decode {
        endpoint,
        reason: e.to_string(),
    })
}
