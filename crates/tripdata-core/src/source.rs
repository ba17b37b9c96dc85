//! Remote archive client: one bounded GET per partition, no retries.
//!
//! Persistence is the store's job; this client only fetches bytes. The caller
//! decides whether a failure means "no data for this period" or "retry later".

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::partition::PartitionKey;

pub struct SourceClient {
    http: reqwest::Client,
    base_url: String,
}

impl SourceClient {
    /// `base_url` is the archive prefix, e.g. the NYC TLC CloudFront mirror.
    /// The timeout bounds the whole request, connect through body.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn file_url(&self, key: PartitionKey) -> String {
        format!("{}/{}", self.base_url, key.file_name())
    }

    pub async fn fetch(&self, key: PartitionKey) -> Result<Bytes, CoreError> {
        let url = self.file_url(key);
        debug!(%key, %url, "fetching partition from remote archive");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| CoreError::FetchFailed {
                key,
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::FetchFailed {
                key,
                reason: format!("remote archive returned HTTP {status}"),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| CoreError::FetchFailed {
                key,
                reason: format!("failed reading response body: {err}"),
            })?;

        info!(%key, bytes = bytes.len(), "downloaded partition file");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_url_joins_base_and_partition_file() {
        let client = SourceClient::new(
            "https://example.com/trip-data/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.file_url(PartitionKey::new(2023, 3)),
            "https://example.com/trip-data/yellow_tripdata_2023-03.parquet"
        );
    }

    #[tokio::test]
    async fn unreachable_archive_is_fetch_failed_not_a_crash() {
        // Port 9 (discard) refuses connections immediately on loopback.
        let client =
            SourceClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = client.fetch(PartitionKey::new(2023, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::FetchFailed { .. }));
    }
}
