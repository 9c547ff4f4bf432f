//! Parent/child record source

use super::context::FetchContext;
use super::record::RecordSource;
use crate::error::{Error, Result};
use crate::partition::{ParentChildSlice, ParentRouter};
use crate::types::Record;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

/// Child records fetched for one parent record
#[derive(Debug, Clone, PartialEq)]
pub struct ChildGroup {
    /// The parent slice the child request was made for
    pub slice: ParentChildSlice,
    /// Child records, or a single empty sentinel when the request failed
    pub records: Vec<Record>,
}

impl ChildGroup {
    /// Whether the group is the sentinel of a failed child request
    pub fn is_sentinel(&self) -> bool {
        matches!(self.records.as_slice(), [only] if only.is_empty())
    }
}

/// A resource that needs one request per record of its parent resource.
///
/// The parent is traversed in full on every fetch. Child requests are single
/// page; further child pages are not requested.
#[derive(Debug)]
pub struct DependentSource {
    parent: Arc<RecordSource>,
    child: RecordSource,
    router: ParentRouter,
}

impl DependentSource {
    /// Wire a child source to its parent.
    ///
    /// The child definition must name `parent` as its parent stream.
    pub fn new(parent: Arc<RecordSource>, child: RecordSource) -> Result<Self> {
        let binding = child.config().parent.as_ref().ok_or_else(|| {
            Error::config(format!("Stream '{}' has no parent binding", child.name()))
        })?;

        if binding.stream != parent.name() {
            return Err(Error::config(format!(
                "Stream '{}' depends on '{}', not '{}'",
                child.name(),
                binding.stream,
                parent.name()
            )));
        }

        let router = ParentRouter::from_config(child.name(), binding);
        Ok(Self {
            parent,
            child,
            router,
        })
    }

    /// Name of the dependent stream
    pub fn name(&self) -> &str {
        self.child.name()
    }

    /// The parent source
    pub fn parent(&self) -> &Arc<RecordSource> {
        &self.parent
    }

    /// The child source
    pub fn child(&self) -> &RecordSource {
        &self.child
    }

    /// One group per parent record, in parent order.
    ///
    /// `parent_ctx` drives the parent traversal; each child request gets a
    /// context derived from it with the parent slice attached.
    pub fn fetch_groups<'a>(
        &'a self,
        parent_ctx: &'a FetchContext,
    ) -> BoxStream<'a, Result<ChildGroup>> {
        self.parent
            .fetch(parent_ctx)
            .and_then(move |record| async move {
                let slice = self.router.slice_for(record)?;
                let ctx = parent_ctx.for_slice(slice.clone());
                let records: Vec<Record> = self.child.fetch(&ctx).try_collect().await?;

                debug!(
                    "{}: {} records for {} {}",
                    self.name(),
                    records.len(),
                    self.router.parent_key(),
                    slice.key
                );
                Ok::<_, Error>(ChildGroup { slice, records })
            })
            .boxed()
    }

    /// Child records of every parent record, flattened
    pub fn fetch<'a>(&'a self, parent_ctx: &'a FetchContext) -> BoxStream<'a, Result<Record>> {
        self.fetch_groups(parent_ctx)
            .map_ok(|group| stream::iter(group.records.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }
}
