// REST fault API client
//
// Thin wrapper over `reqwest::Client` for polled alarm sources. Handles
// auth header injection, URL construction, status checks, and unwrapping
// the vendor's list envelope. Field-level interpretation of the returned
// records belongs to faultwire-core.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// How the API key is presented to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `<header>: <key>`
    Header(&'static str),
}

/// Endpoint layout of one REST fault source.
#[derive(Debug, Clone)]
pub struct RestEndpoints {
    /// Path probed by [`FaultApiClient::test_connection`].
    pub health_path: String,
    /// Path returning the active alarm list.
    pub alarms_path: String,
    /// Object key holding the alarm array, when the body is not a bare array.
    pub envelope: Option<&'static str>,
}

/// HTTP client for a single polled alarm source.
pub struct FaultApiClient {
    http: reqwest::Client,
    base_url: Url,
    endpoints: RestEndpoints,
}

impl FaultApiClient {
    /// Build a client with the auth header baked into every request.
    pub fn new(
        base_url: Url,
        endpoints: RestEndpoints,
        scheme: AuthScheme,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let headers = auth_headers(scheme, api_key)?;
        let http = transport.build_client_with_headers(headers)?;
        Ok(Self {
            http,
            base_url,
            endpoints,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Probe the health endpoint. Any 2xx counts as reachable.
    pub async fn test_connection(&self) -> Result<(), Error> {
        let url = self.url_for(&self.endpoints.health_path)?;
        debug!("GET {}", url);

        let resp = self.http.get(url.clone()).send().await?;
        check_status(&resp, &url)?;
        Ok(())
    }

    /// Fetch the current alarm list as raw JSON records.
    ///
    /// Accepts either a bare JSON array or an object carrying the array
    /// under the configured envelope key. Individual elements are returned
    /// untouched, including ones that are not objects.
    pub async fn fetch_alarms(&self) -> Result<Vec<Value>, Error> {
        let url = self.url_for(&self.endpoints.alarms_path)?;
        debug!("GET {}", url);

        let resp = self.http.get(url.clone()).send().await?;
        check_status(&resp, &url)?;

        let body = resp.text().await?;
        let value: Value = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.clone(),
        })?;

        unwrap_envelope(value, self.endpoints.envelope)
    }

    fn url_for(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&full)?)
    }
}

fn auth_headers(scheme: AuthScheme, api_key: &SecretString) -> Result<HeaderMap, Error> {
    let (name, raw) = match scheme {
        AuthScheme::Bearer => (AUTHORIZATION, format!("Bearer {}", api_key.expose_secret())),
        AuthScheme::Header(name) => (
            HeaderName::from_static(name),
            api_key.expose_secret().to_owned(),
        ),
    };

    let mut value = HeaderValue::from_str(&raw).map_err(|_| Error::Authentication {
        message: "API key contains characters not allowed in an HTTP header".into(),
    })?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(name, value);
    Ok(headers)
}

fn check_status(resp: &reqwest::Response, url: &Url) -> Result<(), Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("HTTP {} from {url}", status.as_u16()),
        });
    }
    Err(Error::Status {
        status: status.as_u16(),
        url: url.to_string(),
    })
}

fn unwrap_envelope(value: Value, envelope: Option<&str>) -> Result<Vec<Value>, Error> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            let key = envelope.ok_or_else(|| {
                Error::UnexpectedPayload("expected a JSON array of alarms".into())
            })?;
            match map.remove(key) {
                Some(Value::Array(items)) => Ok(items),
                Some(Value::Null) | None => Ok(Vec::new()),
                Some(_) => Err(Error::UnexpectedPayload(format!(
                    "envelope key '{key}' is not an array"
                ))),
            }
        }
        _ => Err(Error::UnexpectedPayload(
            "expected a JSON array or object".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn bare_array_is_returned_as_is() {
        let items = unwrap_envelope(json!([{"id": 1}, {"id": 2}]), Some("data")).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn envelope_key_is_unwrapped() {
        let items = unwrap_envelope(json!({"data": [{"id": 1}], "total": 1}), Some("data")).unwrap();
        assert_eq!(items, vec![json!({"id": 1})]);
    }

    #[test]
    fn missing_envelope_key_is_empty() {
        let items = unwrap_envelope(json!({"total": 0}), Some("items")).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn object_without_envelope_is_rejected() {
        let err = unwrap_envelope(json!({"data": []}), None).unwrap_err();
        assert!(matches!(err, Error::UnexpectedPayload(_)));
    }

    #[test]
    fn bearer_header_is_sensitive() {
        let headers =
            auth_headers(AuthScheme::Bearer, &SecretString::from("k3y".to_string())).unwrap();
        let value = headers.get(AUTHORIZATION).unwrap();
        assert!(value.is_sensitive());
        assert_eq!(value.to_str().unwrap(), "Bearer k3y");
    }

    #[test]
    fn named_header_carries_raw_key() {
        let headers = auth_headers(
            AuthScheme::Header("x-api-key"),
            &SecretString::from("abc".to_string()),
        )
        .unwrap();
        assert_eq!(headers.get("x-api-key").unwrap().to_str().unwrap(), "abc");
    }
}
