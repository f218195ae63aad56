//! [`HttpKeyService`]: client for the data key service HTTP API.
//!
//! - `GET {base}/datakey` issues a new data key.
//! - `POST {base}/datakey/actions/decrypt?keyId=<id>` with the wrapped key as
//!   a `text/plain` body unwraps one.
//!
//! A `400` from the decrypt action is final. Any other failure is treated as
//! the service being unavailable and retried with exponential backoff.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Certificate, Client, Identity, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{DataKey, KeyService, KeyServiceError};
use crate::protocol::{DataKeyResponse, DecryptKeyResponse};

/// Backoff schedule for calls that fail with [`KeyServiceError::Unavailable`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Factor applied to the delay after every failed attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

/// Data key service client.
#[derive(Debug)]
pub struct HttpKeyService {
    base_url: String,
    client: Client,
    retry: RetryPolicy,
    /// Unwrapped key text keyed by `"{ciphertext}/{key_id}"`.
    cache: RwLock<HashMap<String, String>>,
}

impl HttpKeyService {
    /// Plain HTTP (or server-authenticated HTTPS) client for `base_url`.
    ///
    /// A trailing `/datakey` on `base_url` is tolerated, so the issue endpoint
    /// itself may be configured.
    ///
    /// # Errors
    ///
    /// Returns [`KeyServiceError::Client`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, KeyServiceError> {
        let client = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| KeyServiceError::Client(e.to_string()))?;
        Ok(Self::with_client(base_url, client))
    }

    /// Mutually authenticated HTTPS client.
    ///
    /// `identity_pem` holds the client certificate chain and private key;
    /// `ca_pem` the certificate(s) used to verify the service.
    ///
    /// # Errors
    ///
    /// Returns [`KeyServiceError::Client`] if the PEM material is unusable.
    pub fn with_mutual_tls(
        base_url: &str,
        identity_pem: &[u8],
        ca_pem: &[u8],
    ) -> Result<Self, KeyServiceError> {
        let identity = Identity::from_pem(identity_pem)
            .map_err(|e| KeyServiceError::Client(format!("client identity: {e}")))?;
        let ca = Certificate::from_pem(ca_pem)
            .map_err(|e| KeyServiceError::Client(format!("CA certificate: {e}")))?;
        let client = Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .add_root_certificate(ca)
            .build()
            .map_err(|e| KeyServiceError::Client(e.to_string()))?;
        Ok(Self::with_client(base_url, client))
    }

    /// Wrap an already configured [`reqwest::Client`].
    pub fn with_client(base_url: &str, client: Client) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let base_url = base_url.strip_suffix("/datakey").unwrap_or(base_url);
        Self {
            base_url: base_url.to_owned(),
            client,
            retry: RetryPolicy::default(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the default [`RetryPolicy`].
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Drop every cached unwrapped key.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    async fn retrying<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, KeyServiceError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, KeyServiceError>>,
    {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1;
        loop {
            match call().await {
                Err(KeyServiceError::Unavailable(reason)) if attempt < self.retry.max_attempts => {
                    warn!(operation, attempt, %reason, "data key service unavailable; retrying");
                    tokio::time::sleep(delay).await;
                    delay = delay.mul_f64(self.retry.multiplier);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn issue_once(&self) -> Result<DataKey, KeyServiceError> {
        let url = format!("{}/datakey", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| KeyServiceError::Unavailable(e.to_string()))?;

        if resp.status() != StatusCode::OK {
            return Err(KeyServiceError::Unavailable(format!(
                "GET {url} returned status {}",
                resp.status().as_u16()
            )));
        }

        let body: DataKeyResponse = resp
            .json()
            .await
            .map_err(|e| KeyServiceError::Unavailable(format!("malformed response: {e}")))?;
        DataKey::try_from(body)
    }

    async fn unwrap_once(&self, key_id: &str, ciphertext: &str) -> Result<String, KeyServiceError> {
        let url = format!("{}/datakey/actions/decrypt", self.base_url);
        let resp = self
            .client
            .post(&url)
            .query(&[("keyId", key_id)])
            .header(CONTENT_TYPE, "text/plain")
            .body(ciphertext.to_owned())
            .send()
            .await
            .map_err(|e| KeyServiceError::Unavailable(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => {
                let body: DecryptKeyResponse = resp.json().await.map_err(|e| {
                    KeyServiceError::Unavailable(format!("malformed response: {e}"))
                })?;
                Ok(body.plaintext_data_key)
            }
            StatusCode::BAD_REQUEST => Err(KeyServiceError::Decryption {
                key_id: key_id.to_owned(),
                status: 400,
            }),
            other => Err(KeyServiceError::Unavailable(format!(
                "POST {url} returned status {}",
                other.as_u16()
            ))),
        }
    }
}

#[async_trait]
impl KeyService for HttpKeyService {
    async fn issue(&self) -> Result<DataKey, KeyServiceError> {
        let key = self.retrying("issue", || self.issue_once()).await?;
        info!(key_id = %key.encryption_key_id, "obtained data key");
        Ok(key)
    }

    async fn unwrap_encoded(&self, key_id: &str, ciphertext: &str) -> Result<String, KeyServiceError> {
        let cache_key = format!("{ciphertext}/{key_id}");
        if let Some(key) = self.cache.read().await.get(&cache_key) {
            debug!(key_id, "data key served from cache");
            return Ok(key.clone());
        }

        info!(key_id, "decrypting data key");
        let key = self
            .retrying("unwrap", || self.unwrap_once(key_id, ciphertext))
            .await?;
        self.cache.write().await.insert(cache_key, key.clone());
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        extract::{Query, State},
        http::StatusCode as AxumStatus,
        routing::{get, post},
        Json, Router,
    };

    const KEY: &str = "czMQLgW/OrzBZwFV9u4EBA==";

    #[derive(Clone, Default)]
    struct Calls {
        issue: Arc<AtomicUsize>,
        decrypt: Arc<AtomicUsize>,
    }

    #[derive(serde::Deserialize)]
    struct KeyIdQuery {
        #[serde(rename = "keyId")]
        key_id: String,
    }

    /// Fake DKS: the first issue call fails with 503, decrypt rejects key id `bad`.
    async fn spawn_fake_dks() -> (String, Calls) {
        let calls = Calls::default();
        let app = Router::new()
            .route(
                "/datakey",
                get(|State(calls): State<Calls>| async move {
                    if calls.issue.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err(AxumStatus::SERVICE_UNAVAILABLE);
                    }
                    Ok(Json(DataKeyResponse {
                        data_key_encryption_key_id: "master-1".into(),
                        plaintext_data_key: KEY.into(),
                        ciphertext_data_key: "wrapped".into(),
                    }))
                }),
            )
            .route(
                "/datakey/actions/decrypt",
                post(
                    |State(calls): State<Calls>, Query(q): Query<KeyIdQuery>, body: String| async move {
                        calls.decrypt.fetch_add(1, Ordering::SeqCst);
                        if q.key_id == "bad" || body != "wrapped" {
                            return Err(AxumStatus::BAD_REQUEST);
                        }
                        Ok(Json(DecryptKeyResponse {
                            data_key_encryption_key_id: Some(q.key_id),
                            plaintext_data_key: KEY.into(),
                        }))
                    },
                ),
            )
            .with_state(calls.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), calls)
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    #[test]
    fn trailing_datakey_path_is_stripped() {
        let svc = HttpKeyService::with_client("http://dks:8443/datakey/", Client::new());
        assert_eq!(svc.base_url, "http://dks:8443");
    }

    #[tokio::test]
    async fn issue_retries_unavailable_service() {
        let (url, calls) = spawn_fake_dks().await;
        let svc = HttpKeyService::new(&url).unwrap().with_retry(fast_retry());
        let key = svc.issue().await.unwrap();
        assert_eq!(key.encryption_key_id, "master-1");
        assert_eq!(key.plaintext.as_bytes().len(), 16);
        assert_eq!(calls.issue.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unwrap_caches_keys() {
        let (url, calls) = spawn_fake_dks().await;
        let svc = HttpKeyService::new(&url).unwrap().with_retry(fast_retry());
        let first = svc.unwrap("master-1", "wrapped").await.unwrap();
        let second = svc.unwrap("master-1", "wrapped").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(svc.unwrap_encoded("master-1", "wrapped").await.unwrap(), KEY);
        assert_eq!(calls.decrypt.load(Ordering::SeqCst), 1);

        svc.clear_cache().await;
        svc.unwrap("master-1", "wrapped").await.unwrap();
        assert_eq!(calls.decrypt.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bad_request_is_not_retried() {
        let (url, calls) = spawn_fake_dks().await;
        let svc = HttpKeyService::new(&url).unwrap().with_retry(fast_retry());
        let err = svc.unwrap("bad", "wrapped").await.unwrap_err();
        assert!(matches!(err, KeyServiceError::Decryption { status: 400, .. }));
        assert_eq!(calls.decrypt.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_service_gives_up_after_max_attempts() {
        let svc = HttpKeyService::new("http://127.0.0.1:1")
            .unwrap()
            .with_retry(fast_retry());
        assert!(matches!(
            svc.issue().await,
            Err(KeyServiceError::Unavailable(_))
        ));
    }
}
