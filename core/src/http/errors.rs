use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;
pub type BuildResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request error: {0}")]
    Request(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited,
    #[error("timeout")]
    Timeout,
    #[error("server error: {0}")]
    ServerError(u16),
    /// Non-2xx reply carrying a venue error payload, e.g. `{"code":-2011,"msg":"Unknown order sent."}`.
    #[error("api error (http {status}, code {code:?}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("auth error: {0}")]
    AuthError(String),
}

impl ClientError {
    /// Build an `Api` error from a raw body, pulling `code`/`msg` (Binance) or
    /// `retCode`/`retMsg` (Bybit) when the body is JSON.
    pub fn from_body(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
        let code = parsed.as_ref().and_then(|v| {
            v.get("code")
                .or_else(|| v.get("retCode"))
                .and_then(serde_json::Value::as_i64)
        });
        let message = parsed
            .as_ref()
            .and_then(|v| {
                v.get("msg")
                    .or_else(|| v.get("retMsg"))
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string());
        ClientError::Api {
            status,
            code,
            message,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ClientError::Timeout;
        }
        ClientError::Request(err.to_string())
    }
}

impl From<reqwest_middleware::Error> for ClientError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            other => ClientError::Request(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binance_body_keeps_code_and_message() {
        let err = ClientError::from_body(400, r#"{"code":-2011,"msg":"Unknown order sent."}"#);
        match err {
            ClientError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, Some(-2011));
                assert_eq!(message, "Unknown order sent.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bybit_body_uses_ret_fields() {
        let err = ClientError::from_body(
            400,
            r#"{"retCode":110001,"retMsg":"order not exists or too late to cancel"}"#,
        );
        assert!(matches!(err, ClientError::Api { code: Some(110001), .. }));
    }

    #[test]
    fn non_json_body_becomes_message() {
        let err = ClientError::from_body(400, "Bad Request");
        match err {
            ClientError::Api { code, message, .. } => {
                assert_eq!(code, None);
                assert_eq!(message, "Bad Request");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
