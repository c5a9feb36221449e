use std::future::Future;

use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use snafu::ResultExt;
use tracing::instrument;
use url::Url;

use crate::model::WireRecord;

pub use error::*;

mod error;

/// Transport for closed sessions. One call carries the whole batch.
///
/// Retrying is not the client's business: a failed batch stays queued on the tracker side.
pub trait FlushClient: Send + Sync + 'static {
    fn send(&self, batch: Vec<WireRecord>) -> impl Future<Output = Result<()>> + Send;
}

/// HTTP client for the Aladin tracking endpoint.
#[derive(Debug, Clone)]
pub struct Backend {
    client: reqwest::Client,
    endpoint: Url,
}

impl Backend {
    pub fn new(endpoint: Url, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(token) = token {
            let mut value =
                HeaderValue::from_str(&format!("Bearer {token}")).context(InvalidTokenSnafu)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context(BuildClientSnafu)?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl FlushClient for Backend {
    #[instrument(skip(self, batch), fields(endpoint = %self.endpoint, count = batch.len()))]
    async fn send(&self, batch: Vec<WireRecord>) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&batch)
            .send()
            .await
            .context(RequestSnafu {
                endpoint: self.endpoint.clone(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return RejectedSnafu {
                endpoint: self.endpoint.clone(),
                status,
            }
            .fail();
        }

        tracing::debug!(%status, "tracking batch accepted");
        Ok(())
    }
}
