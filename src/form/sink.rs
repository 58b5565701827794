use crate::api::ApiClient;
use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

/// Whether a submission creates a record or updates an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitTarget {
    Create,
    Update(String),
}

/// A validated record on its way out of a dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission<R> {
    pub target: SubmitTarget,
    pub record: R,
}

/// Receives the final field set when a dialog is confirmed.
#[async_trait]
pub trait SubmissionSink<R: Send + 'static>: Send + Sync {
    async fn submit(&self, submission: Submission<R>) -> anyhow::Result<()>;
}

/// Sends submissions to a REST collection: creates are POSTed to the
/// collection path, updates are PUT to `<collection>/<id>`.
#[derive(Debug, Clone)]
pub struct HttpSink {
    api: ApiClient,
    collection: String,
}

impl HttpSink {
    pub fn new(api: ApiClient, collection: impl Into<String>) -> Self {
        Self {
            api,
            collection: collection.into(),
        }
    }

    fn record_path(&self, id: &str) -> String {
        let encoded = self.api.path_segment(id);
        format!("{}/{}", self.collection.trim_end_matches('/'), encoded)
    }
}

#[async_trait]
impl<R> SubmissionSink<R> for HttpSink
where
    R: Serialize + Send + Sync + 'static,
{
    async fn submit(&self, submission: Submission<R>) -> anyhow::Result<()> {
        match &submission.target {
            SubmitTarget::Create => {
                tracing::info!(collection = %self.collection, "Creating record");
                self.api
                    .post_json(&self.collection, &submission.record)
                    .await
                    .with_context(|| format!("Failed to create record at {}", self.collection))?;
            }
            SubmitTarget::Update(id) => {
                let path = self.record_path(id);
                tracing::info!(path = %path, "Updating record");
                self.api
                    .put_json(&path, &submission.record)
                    .await
                    .with_context(|| format!("Failed to update record at {}", path))?;
            }
        }
        Ok(())
    }
}
