use bytes::Bytes;
use futures_util::stream::BoxStream;
use jobstream_core::Manifest;

use crate::{ApiClient, ApiError};

/// Raw body chunks of an open event stream, as the transport delivers them.
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// The two server calls a running job session depends on.
#[async_trait::async_trait]
pub trait JobBackend: Send + Sync {
    async fn open_stream(&self, job_id: &str) -> Result<ByteStream, ApiError>;

    async fn fetch_manifest(&self, job_id: &str) -> Result<Manifest, ApiError>;
}

#[async_trait::async_trait]
impl JobBackend for ApiClient {
    async fn open_stream(&self, job_id: &str) -> Result<ByteStream, ApiError> {
        ApiClient::open_stream(self, job_id).await
    }

    async fn fetch_manifest(&self, job_id: &str) -> Result<Manifest, ApiError> {
        ApiClient::fetch_manifest(self, job_id).await
    }
}
