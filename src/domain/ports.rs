use crate::domain::model::{Annotations, FetchError, FetchResponse, Identifier, OwnerId};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// One network observation of a rendered probe URL. Alternative fetch
/// mechanisms (browser automation, JSON APIs) plug in here.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchResponse, FetchError>;
}

/// Source of an owner's saved identifiers for a bulk check.
#[async_trait]
pub trait SavedSets: Send + Sync {
    async fn saved(&self, owner: OwnerId) -> Result<Vec<Identifier>>;

    /// Last non-fatal persistence problem, if the source is backed by a file.
    fn persistence_warning(&self) -> Option<String> {
        None
    }
}

/// Outbound side of the messaging collaborator.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn max_chunk_size(&self) -> usize;
    async fn send(&self, chunk: &str) -> Result<()>;
}

/// Secondary lookup run over the positive identifiers of a batch before
/// formatting. Implementations absorb their own failures as `None` entries.
#[async_trait]
pub trait Annotator: Send + Sync {
    async fn annotate(&self, ids: &[Identifier]) -> Annotations;
}

/// Leaves every line unannotated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnnotation;

#[async_trait]
impl Annotator for NoAnnotation {
    async fn annotate(&self, _ids: &[Identifier]) -> Annotations {
        Annotations::new()
    }
}
