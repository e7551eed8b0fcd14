use std::fmt::Debug;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{Level, event, instrument};

use crate::error::ClientError;

/// Thin typed wrapper over [`reqwest::Client`]. A non-2xx response becomes
/// [`ClientError::Status`] carrying the body text, which is what the
/// authorization-retry policy classifies on.
#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Client {
            client: reqwest::Client::new(),
        }
    }

    #[instrument(level = "trace", skip(self, bearer))]
    pub async fn get<U, T>(&self, url: U, bearer: Option<&str>) -> Result<T, ClientError>
    where
        U: reqwest::IntoUrl + Debug,
        T: DeserializeOwned,
    {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        Self::decode(response).await
    }

    #[instrument(level = "trace", skip(self, bearer, request), fields(json_request = serde_json::to_string(request).unwrap()))]
    pub async fn post<U, S, T>(
        &self,
        url: U,
        bearer: Option<&str>,
        request: &S,
    ) -> Result<T, ClientError>
    where
        U: reqwest::IntoUrl + Debug,
        S: Serialize + Sized,
        T: DeserializeOwned,
    {
        let mut builder = self.client.post(url).json(request);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;
        Self::decode(response).await
    }

    /// Raw PUT of file bytes, used for direct uploads to presigned object
    /// storage locations. The body is opaque to this layer.
    #[instrument(level = "trace", skip(self, body), fields(bytes = body.len()))]
    pub async fn put_bytes<U>(
        &self,
        url: U,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<(), ClientError>
    where
        U: reqwest::IntoUrl + Debug,
    {
        let response = self.client.put(url).headers(headers).body(body).send().await?;
        Self::success_text(response).await?;
        Ok(())
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let text = Self::success_text(response).await?;
        event!(Level::TRACE, response = text.as_str());
        serde_json::from_str::<T>(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn success_text(response: reqwest::Response) -> Result<String, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Client::new();
        let _cloned = client.clone();
    }
}
