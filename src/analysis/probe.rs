use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("asset responded with {0}")]
    Status(u16),
    #[error("asset request failed: {0}")]
    Transport(String),
}

/// Checks that a published URL can actually be fetched.
#[async_trait]
pub trait AssetProbe: Send + Sync {
    async fn check(&self, url: &str) -> Result<(), ProbeError>;
}

/// Issues a single `HEAD` request.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("build probe http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AssetProbe for HttpProbe {
    async fn check(&self, url: &str) -> Result<(), ProbeError> {
        let res = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(res.status().as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn head_ok_is_reachable() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/food_images/u/a.jpg"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let probe = HttpProbe::new(5).unwrap();
        probe
            .check(&format!("{}/food_images/u/a.jpg", server.uri()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_object_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let probe = HttpProbe::new(5).unwrap();
        let err = probe
            .check(&format!("{}/nope.jpg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Status(404)));
    }

    #[tokio::test]
    async fn bad_url_is_a_transport_error() {
        let probe = HttpProbe::new(5).unwrap();
        let err = probe.check("not a url").await.unwrap_err();
        assert!(matches!(err, ProbeError::Transport(_)));
    }
}
