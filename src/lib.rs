//! # Headless Site
//!
//! A static site generator whose content lives in a remote headless CMS.
//! A site is a [`registry::Registry`] of pages, collections, layouts, and
//! email templates, each page rendered by a plain Rust function returning
//! [`maud::Markup`]. A build fetches every page's fields from the content
//! service, renders it in every configured locale, downloads referenced
//! media, and writes a self-contained static tree.
//!
//! # Architecture: Five-Stage Pipeline
//!
//! ```text
//! 1. Registry   descriptors + layout chains                  (registry)
//! 2. Client     GET /pages, /pages/<p>, /seo/<p>, /locales   (client)
//! 3. Plan       registry + remote pages → fetch jobs          (plan)
//! 4. Fetch      jobs → page contents, 10 in flight            (fetch)
//! 5. Emit       render → compose → strip → minify → write     (emit, compose)
//! ```
//!
//! After emission the build writes template files, `_routes.json`,
//! `_router.js`, the sitemap with `robots.txt`, and the schema-sync payload.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `site.toml` loading, stock defaults, validation |
//! | [`registry`] | Page, collection, layout, and email-template descriptors |
//! | [`content`] | `PageContent`, subcollection entries, typed field accessors |
//! | [`fields`] | Field value kinds: text, numbers, links |
//! | [`image`] | `ImageValue` with its shared resolved-variant cache |
//! | [`client`] | `ContentSource` seam and the HTTP `ContentClient` |
//! | [`plan`] | Fetch-job planning |
//! | [`fetch`] | Bounded-concurrency fetching and cancellation |
//! | [`compose`] | Layout composition, fragments, authoring-attribute stripping |
//! | [`emit`] | Path mapping, minification, file writers |
//! | [`media`] | Content-addressed media downloads and variants |
//! | [`sitemap`] | Sitemap, hreflang alternates, robots.txt |
//! | [`schema`] | Schema discovery from template files and the sync payload |
//! | [`build`] | The orchestrator: `Builder` and [`build::build`] |
//! | [`output`] | Terminal formatting of registrations and build reports |
//!
//! # Design Decisions
//!
//! ## Maud Components
//!
//! Render functions return [`maud::Markup`] and layouts take the inner body
//! as `Markup`. Composition is plain function application, fragments are the
//! same composition with the outer layouts left off, and everything the CMS
//! supplies is escaped unless a render function asks for rich text.
//!
//! ## Absent vs. Present Subcollections
//!
//! "No CMS data at all" and "no entries" are different states, tagged by
//! [`content::Subcollections`]. Template files are rendered from absent data
//! so every subcollection block appears exactly once, which is what schema
//! discovery reads.
//!
//! ## Content-Addressed Media
//!
//! Media files are named after a hash of their URL with volatile signature
//! parameters removed, so rotating signed URLs don't create new files on
//! every build.
//!
//! ## Failure Model
//!
//! Only local failures stop a build: filesystem writes, schema payload
//! serialisation, the pre-build hook, and cancellation. A page the service
//! can't deliver is rendered from empty content; a media variant that can't
//! be downloaded is left out of the `srcset`.

pub mod build;
pub mod client;
pub mod compose;
pub mod config;
pub mod content;
pub mod emit;
pub mod fetch;
pub mod fields;
pub mod image;
pub mod media;
pub mod output;
pub mod plan;
pub mod registry;
pub mod schema;
pub mod sitemap;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use build::{BuildError, BuildReport, Builder, build};
pub use config::{SiteConfig, load_config};
pub use content::{Entry, Fields, PageContent};
pub use registry::{Registry, change_freq, no_sitemap, priority};
