//! Bounded-concurrency page fetching.
//!
//! One fetch pass turns `N` jobs into `N` page contents for a single locale,
//! making two service calls per job (content, then SEO). Jobs run on a
//! dedicated rayon pool of [`MAX_IN_FLIGHT`] threads, so at most that many
//! jobs talk to the service at once. Results come back from an indexed
//! parallel iterator and are therefore aligned with the input jobs no matter
//! which finishes first.
//!
//! Request failures never fail the pass: a job whose content request fails
//! yields empty content (with a warning unless it is a template job, which is
//! expected to 404), and a failed SEO request just leaves the SEO unset.

use crate::client::{ClientError, ContentSource};
use crate::content::PageContent;
use crate::image::ImageProcessor;
use crate::media::MediaDownloader;
use crate::plan::FetchJob;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Concurrent fetch ceiling.
pub const MAX_IN_FLIGHT: usize = 10;

/// Shared cancellation flag. Once set, no further service calls are made.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn guard<T>(&self, call: impl FnOnce() -> Result<T, ClientError>) -> Result<T, ClientError> {
        if self.is_cancelled() {
            Err(ClientError::Cancelled)
        } else {
            call()
        }
    }
}

/// The rayon pool fetch passes run on.
pub fn fetch_pool() -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(MAX_IN_FLIGHT)
        .thread_name(|i| format!("fetch-{i}"))
        .build()
}

/// Per-pass settings.
#[derive(Clone, Copy)]
pub struct FetchOptions<'a> {
    pub locale: &'a str,
    pub images: Option<&'a ImageProcessor>,
    pub media: Option<&'a MediaDownloader>,
    pub cancel: &'a CancelToken,
}

/// Fetch every job in `locale`. The result has one entry per job, in order.
pub fn fetch_all(
    pool: &rayon::ThreadPool,
    source: &dyn ContentSource,
    jobs: &[FetchJob],
    options: FetchOptions<'_>,
) -> Vec<PageContent> {
    pool.install(|| {
        jobs.par_iter()
            .map(|job| fetch_one(source, job, options))
            .collect()
    })
}

fn fetch_one(source: &dyn ContentSource, job: &FetchJob, options: FetchOptions<'_>) -> PageContent {
    let FetchOptions {
        locale,
        images,
        media,
        cancel,
    } = options;

    let mut content = match cancel.guard(|| source.get_page(&job.path, locale)) {
        Ok(data) => PageContent::from_page_data(data, &job.path, &job.slug, locale),
        Err(ClientError::Cancelled) => PageContent::empty(&job.path, &job.slug, locale),
        Err(e) => {
            if !job.is_template {
                tracing::warn!(path = %job.path, locale, error = %e, "Failed to fetch page content");
            }
            PageContent::empty(&job.path, &job.slug, locale)
        }
    };

    if let Ok(seo) = cancel.guard(|| source.get_seo(&job.path, locale)) {
        content.seo = Some(seo);
    }

    if let Some(processor) = images {
        content.set_image_processor(Some(Arc::clone(processor)));
    }

    if let Some(downloader) = media
        && let Some(seo) = content.seo.as_mut()
        && !seo.og_image_url.is_empty()
    {
        match downloader.download(&seo.og_image_url) {
            Ok(local) => seo.og_image_url = local,
            Err(e) => {
                tracing::warn!(path = %job.path, url = %seo.og_image_url, error = %e, "Failed to download OG image")
            }
        }
    }

    content
}
