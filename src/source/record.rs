//! Paginated record source for one resource

use super::context::FetchContext;
use crate::config::{ErrorPolicy, StreamConfig};
use crate::decode::{ListDecoder, RecordDecoder};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig, RetryMode};
use crate::pagination::{build_paginator, PaginationToken, Paginator};
use crate::template;
use crate::types::Record;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a traversal stands between two pages
enum PageState {
    Next(Option<PaginationToken>),
    Done,
}

/// Lazy, paginated reader of one API resource
pub struct RecordSource {
    config: StreamConfig,
    client: Arc<HttpClient>,
    paginator: Box<dyn Paginator>,
    decoder: Box<dyn RecordDecoder>,
}

impl RecordSource {
    /// Build a source from a stream definition
    pub fn new(client: Arc<HttpClient>, config: StreamConfig) -> Self {
        let paginator = build_paginator(&config.pagination);
        let decoder = Box::new(ListDecoder::new(config.record_key.clone()));

        Self {
            config,
            client,
            paginator,
            decoder,
        }
    }

    /// Stream name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Stream definition
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Lazy stream of pages.
    ///
    /// Each item is one fully decoded page. The stream ends after the page the
    /// paginator reports as last, or with the first error.
    pub fn fetch_pages<'a>(&'a self, ctx: &'a FetchContext) -> BoxStream<'a, Result<Vec<Record>>> {
        let first = PageState::Next(self.paginator.first_token());

        stream::try_unfold(first, move |state| async move {
            let token = match state {
                PageState::Next(token) => token,
                PageState::Done => return Ok(None),
            };

            if ctx.is_cancelled() {
                return Err(Error::Cancelled {
                    stream: self.name().to_string(),
                });
            }

            let (records, next) = self.fetch_page(ctx, token).await?;
            let state = match next {
                Some(next) => PageState::Next(Some(next)),
                None => PageState::Done,
            };
            Ok::<_, Error>(Some((records, state)))
        })
        .boxed()
    }

    /// Lazy stream of records, page by page
    pub fn fetch<'a>(&'a self, ctx: &'a FetchContext) -> BoxStream<'a, Result<Record>> {
        self.fetch_pages(ctx)
            .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }

    /// Fetch one page and work out the token of the next
    async fn fetch_page(
        &self,
        ctx: &FetchContext,
        token: Option<PaginationToken>,
    ) -> Result<(Vec<Record>, Option<PaginationToken>)> {
        let (path, request) = self.build_request(ctx, token.as_ref())?;

        let body = match self.client.get_json(&path, &request).await {
            Ok(body) => body,
            Err(Error::HttpStatus { status, body }) if self.config.on_error == ErrorPolicy::EmitEmpty => {
                warn!(
                    "{}: HTTP {status} for {path}{}, emitting empty record ({body})",
                    self.name(),
                    slice_suffix(ctx),
                );
                return Ok((vec![Record::new()], None));
            }
            Err(e) => return Err(e),
        };

        let records = self.decoder.decode(&body)?;
        let next = self.paginator.next(self.name(), &body)?;

        if let (Some(current), Some(next)) = (token, next) {
            if next <= current {
                return Err(Error::protocol(
                    self.name(),
                    format!("page {} was followed by page {}", current.page, next.page),
                ));
            }
        }

        debug!(
            "{}: page {} fetched {} records{}",
            self.name(),
            token.map_or(1, |t| t.page),
            records.len(),
            if next.is_some() { "" } else { " (last page)" }
        );

        Ok((records, next))
    }

    /// Rendered path and query of a request
    fn build_request(
        &self,
        ctx: &FetchContext,
        token: Option<&PaginationToken>,
    ) -> Result<(String, RequestConfig)> {
        let template_ctx = ctx.template_context(self.config.cursor_field());

        let path = if template::has_templates(&self.config.path) {
            template::render(&self.config.path, &template_ctx)?
        } else {
            self.config.path.clone()
        };

        let mut request = RequestConfig::new();
        for (key, value) in &self.config.params {
            let rendered = template::render(value, &template_ctx)?;
            if !rendered.is_empty() {
                request = request.query(key, rendered);
            }
        }

        if let (Some(incremental), Some(watermark)) = (&self.config.incremental, &ctx.watermark) {
            request = request.query(&incremental.request_param, watermark.as_str());
        }

        for (key, value) in self.paginator.query_params(token) {
            request = request.query(key, value);
        }

        if self.config.on_error == ErrorPolicy::EmitEmpty {
            request = request.retry(RetryMode::Transient);
        }

        Ok((path, request))
    }
}

fn slice_suffix(ctx: &FetchContext) -> String {
    ctx.parent
        .as_ref()
        .map(|slice| format!(" (parent {})", slice.key))
        .unwrap_or_default()
}

impl std::fmt::Debug for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSource")
            .field("name", &self.config.name)
            .field("path", &self.config.path)
            .finish_non_exhaustive()
    }
}
