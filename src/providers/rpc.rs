//! RPC Client Module - Multi-Chain Alchemy Integration
//!
//! 1. Dynamic URL construction from ALCHEMY_API_KEY
//! 2. Fallback to public RPCs when Alchemy fails
//! 3. Exponential backoff retry logic
//! 4. User-Agent header & API key protection

use eyre::{eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::config::ChainKey;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{
    DEFAULT_RPC_TIMEOUT_SECS, RPC_BASE_RETRY_DELAY_MS, RPC_MAX_RETRIES, USER_AGENT as UA,
};

/// RPC provider with retry logic and fallback support
#[derive(Clone)]
pub struct RpcProvider {
    /// Primary RPC URL (Alchemy)
    primary_url: String,
    /// Fallback RPC URL (public)
    fallback_url: String,
    /// HTTP client with custom headers
    client: reqwest::Client,
    /// Chain this provider talks to
    chain: ChainKey,
}

impl RpcProvider {
    /// Create a provider for a chain. Dynamically constructs the
    /// Alchemy URL from ALCHEMY_API_KEY; a missing key is a
    /// configuration error surfaced at the start boundary.
    pub fn for_chain(chain: ChainKey) -> AppResult<Self> {
        let api_key = alchemy_api_key()?;
        let primary_url = format!(
            "https://{}.g.alchemy.com/v2/{}",
            chain.alchemy_subdomain(),
            api_key
        );

        let client = build_client()?;

        Ok(Self {
            primary_url,
            fallback_url: chain.public_rpc().to_string(),
            client,
            chain,
        })
    }

    /// Execute JSON-RPC call with retry logic and fallback
    pub async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        match self.call_optional(method, params).await? {
            Some(result) => Ok(result),
            None => Err(eyre!("No result in response for {}", method)),
        }
    }

    /// Like `call`, but a null/absent result is Ok(None). Needed for
    /// receipt polling where "not mined yet" is a normal answer.
    pub async fn call_optional<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        // Try primary (Alchemy) with retries
        match self.call_with_retry(&self.primary_url, &payload).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                warn!("⚠️ Primary RPC failed on {}: {}", self.chain, e);
            }
        }

        // Try fallback
        info!("🔄 Trying fallback RPC for {}", self.chain);
        match self.call_with_retry(&self.fallback_url, &payload).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("⚠️ Fallback RPC also failed: {}", e);
                Err(eyre!("All RPC endpoints failed for {}", self.chain))
            }
        }
    }

    /// Execute call with exponential backoff retry
    async fn call_with_retry<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<T>> {
        let mut last_error = None;

        for attempt in 0..RPC_MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 100ms, 200ms, 400ms...
                let delay = RPC_BASE_RETRY_DELAY_MS * (2_u64.pow(attempt - 1));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.execute_call::<T>(url, payload).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if e.to_string().contains("429") || e.to_string().contains("rate limit") {
                        warn!(
                            "⏳ Rate limited, backing off (attempt {}/{})",
                            attempt + 1,
                            RPC_MAX_RETRIES
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| eyre!("Unknown error after {} retries", RPC_MAX_RETRIES)))
    }

    /// Execute single RPC call
    async fn execute_call<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<T>> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| eyre!("Request failed: {}", e))?;

        let status = response.status();
        if status == 429 {
            return Err(eyre!("Rate limited (HTTP 429)"));
        }
        if !status.is_success() {
            return Err(eyre!("HTTP error: {}", status));
        }

        let json: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| eyre!("Failed to parse response: {}", e))?;

        if let Some(error) = json.error {
            return Err(eyre!("RPC error: {} (code: {})", error.message, error.code));
        }

        Ok(json.result)
    }

    /// Get RPC URL for logging, with the API key masked
    pub fn masked_url(&self) -> String {
        if self.primary_url.contains("/v2/") {
            let parts: Vec<&str> = self.primary_url.split("/v2/").collect();
            if parts.len() == 2 {
                return format!("{}/v2/***HIDDEN***", parts[0]);
            }
        }
        self.primary_url.clone()
    }

    /// Chain this provider talks to
    pub fn chain(&self) -> ChainKey {
        self.chain
    }
}

/// Read ALCHEMY_API_KEY from the environment. The key itself is never
/// logged.
pub fn alchemy_api_key() -> AppResult<String> {
    if let Ok(key) = std::env::var("ALCHEMY_API_KEY") {
        if !key.is_empty() && key != "YOUR_API_KEY" {
            return Ok(key);
        }
    }
    Err(AppError::missing_api_key("ALCHEMY_API_KEY"))
}

/// Build HTTP client with custom headers
fn build_client() -> AppResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(UA));
    headers.insert("Content-Type", HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS))
        .gzip(true)
        .build()
        .map_err(|e| AppError::with_source(ErrorCode::ConfigInvalidValue, "Failed to build HTTP client", e))
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    result: Option<T>,
    error: Option<RpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}
