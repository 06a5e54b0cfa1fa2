use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Request;
use reqwest::header::{HeaderMap, HeaderName};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use url::form_urlencoded;

use crate::http::errors::ClientError;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn apply_auth(&self, request: &mut Request) -> Result<(), ClientError>;
}

/// Public endpoints.
#[derive(Debug, Clone)]
pub struct NoAuth;

#[async_trait]
impl AuthProvider for NoAuth {
    async fn apply_auth(&self, _request: &mut Request) -> Result<(), ClientError> {
        Ok(())
    }
}

pub fn now_ms() -> Result<u64, ClientError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| ClientError::AuthError("system clock is before UNIX epoch".to_string()))
}

/// Compute HMAC-SHA256 and return the hex-encoded digest.
pub fn hmac_sha256_hex(secret: &[u8], data: &[u8]) -> Result<String, ClientError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|_| ClientError::AuthError("invalid HMAC key (api_secret)".to_string()))?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), ClientError> {
    let header_value = value.parse().map_err(|_| {
        ClientError::AuthError(format!("auth header '{}' contains invalid characters", name))
    })?;
    headers.insert(HeaderName::from_static(name), header_value);
    Ok(())
}

/// Binance signed endpoint: `timestamp` + `recvWindow` appended to the query,
/// HMAC of the whole query appended as `signature`, key in `X-MBX-APIKEY`.
pub fn apply_binance_hmac_auth(
    request: &mut Request,
    api_key: &str,
    api_secret: &str,
    recv_window_ms: u64,
    timestamp_ms: u64,
) -> Result<(), ClientError> {
    let url = request.url_mut();

    // A retried request still carries the previous attempt's signing params
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "timestamp" && k != "signature" && k != "recvWindow")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    pairs.push(("timestamp".to_string(), timestamp_ms.to_string()));
    pairs.push(("recvWindow".to_string(), recv_window_ms.to_string()));

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in &pairs {
        serializer.append_pair(k, v);
    }
    let query_to_sign = serializer.finish();
    let signature = hmac_sha256_hex(api_secret.as_bytes(), query_to_sign.as_bytes())?;

    url.set_query(Some(&format!("{}&signature={}", query_to_sign, signature)));
    set_header(request.headers_mut(), "x-mbx-apikey", api_key)
}

/// Bybit V5 signing: `HMAC(timestamp + api_key + recv_window + payload)` where
/// payload is the query string for GET/DELETE and the raw JSON body otherwise.
pub fn apply_bybit_hmac_auth(
    request: &mut Request,
    api_key: &str,
    api_secret: &str,
    recv_window_ms: u64,
    timestamp_ms: u64,
) -> Result<(), ClientError> {
    let timestamp = timestamp_ms.to_string();
    let recv_window = recv_window_ms.to_string();

    let payload = match *request.method() {
        reqwest::Method::GET | reqwest::Method::DELETE => {
            request.url().query().unwrap_or("").to_string()
        }
        _ => request
            .body()
            .and_then(|b| b.as_bytes())
            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
            .unwrap_or_default(),
    };

    let sign_str = format!("{}{}{}{}", timestamp, api_key, recv_window, payload);
    let signature = hmac_sha256_hex(api_secret.as_bytes(), sign_str.as_bytes())?;

    let headers = request.headers_mut();
    set_header(headers, "x-bapi-api-key", api_key)?;
    set_header(headers, "x-bapi-timestamp", &timestamp)?;
    set_header(headers, "x-bapi-recv-window", &recv_window)?;
    set_header(headers, "x-bapi-sign", &signature)?;

    Ok(())
}
