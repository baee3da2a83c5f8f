//! Fetch planning.
//!
//! Turns the registry plus the list of published remote pages into a flat,
//! deduplicated list of [`FetchJob`]s. Job order matters downstream:
//!
//! 1. collection entries (remote pages under a collection's base path),
//! 2. fixed pages,
//! 3. collection listings (base paths),
//! 4. collection template URLs.
//!
//! Entries come first so the emitter can attach complete listings to the
//! listing pages that follow them.

use crate::client::RemotePage;
use crate::registry::{Registry, slug_from_path};
use std::collections::HashSet;

/// One (path, kind) to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub path: String,
    pub slug: String,
    /// Set for entries of a registered collection.
    pub collection_key: Option<String>,
    /// The synthetic `_template` URL of a collection.
    pub is_template: bool,
}

impl FetchJob {
    fn page(path: &str) -> Self {
        Self {
            path: path.to_string(),
            slug: slug_from_path(path),
            collection_key: None,
            is_template: false,
        }
    }

    pub fn is_entry(&self) -> bool {
        self.collection_key.is_some()
    }
}

/// Build the fetch plan.
pub fn plan(registry: &Registry, remote: &[RemotePage]) -> Vec<FetchJob> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut jobs = Vec::new();

    for collection in registry.collections() {
        for page in remote {
            if !collection.is_entry_path(&page.path) || !seen.insert(page.path.clone()) {
                continue;
            }
            let slug = if page.slug.is_empty() {
                slug_from_path(&page.path)
            } else {
                page.slug.clone()
            };
            jobs.push(FetchJob {
                path: page.path.clone(),
                slug,
                collection_key: Some(collection.key.clone()),
                is_template: false,
            });
        }
    }

    for page in registry.pages() {
        if seen.insert(page.path.clone()) {
            jobs.push(FetchJob::page(&page.path));
        }
    }

    for collection in registry.collections() {
        if seen.insert(collection.base_path.clone()) {
            jobs.push(FetchJob::page(&collection.base_path));
        }
    }

    for collection in registry.collections() {
        if seen.insert(collection.template_url.clone()) {
            jobs.push(FetchJob {
                is_template: true,
                ..FetchJob::page(&collection.template_url)
            });
        }
    }

    jobs
}
