//! The HTTP capability the rest of the crate is written against.
//!
//! [`reqwest::Client`] implements [`Transport`] directly, so usually you just hand a client
//! to [`crate::booru::ImageBooru::new`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::{BooruError, Result};

/// A plain `GET url -> body` capability.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and return the whole response body.
    ///
    /// `timeout` overrides the transport's own timeout for this request only.
    ///
    /// # Errors
    ///
    /// Implementations must report every failure, including error status codes,
    /// as [`BooruError::Network`].
    async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<Vec<u8>>;
}

#[async_trait]
impl Transport for Client {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let request = self.get(url);
        let request = match timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        };

        let response = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| BooruError::network(url, err))?;
        debug!(status = %response.status(), "Response received");

        let body = response
            .bytes()
            .await
            .map_err(|err| BooruError::network(url, err))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<Vec<u8>> {
        (**self).fetch(url, timeout).await
    }
}


#[cfg(test)]
mod tests {
    use super::mock::ScriptedTransport;
    use super::*;

    #[tokio::test]
    async fn test_scripted_transport_counts_hits() {
        let transport = ScriptedTransport::new();
        transport.reply("https://a.test/x", "body");
        transport.fail("https://a.test/y", "connection reset");

        // through the `Arc` blanket impl
        let shared: Arc<dyn Transport> = transport.clone();
        assert_eq!(shared.fetch("https://a.test/x", None).await.unwrap(), b"body");
        assert_eq!(shared.fetch("https://a.test/x", None).await.unwrap(), b"body");

        let err = shared.fetch("https://a.test/y", None).await.unwrap_err();
        assert!(matches!(err, BooruError::Network { .. }));
        assert!(err.to_string().contains("connection reset"));

        assert_eq!(transport.hits("https://a.test/x"), 2);
        assert_eq!(transport.hits("https://a.test/y"), 1);
        assert_eq!(transport.hits("https://a.test/z"), 0);
        assert_eq!(transport.total_hits(), 3);
    }
}
