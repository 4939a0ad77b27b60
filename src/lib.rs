//! Mirror the latest LinkedIn post into a git repository.
//!
//! Two independent flows share this crate:
//!
//! - **fetch-and-publish**: [`linkedin::fetch_latest_post`] writes the
//!   artifact, then [`publish::publish_artifact`] commits it and pushes with
//!   a bounded compare-and-swap retry loop.
//! - **image publish**: [`publish::publish_images`] commits new images and
//!   pushes once.
//!
//! [`enrich::enrich_post`] optionally derives SEO fields and image alt text
//! from the artifact into a separate file.

pub mod config;
pub mod enrich;
pub mod git;
pub mod linkedin;
pub mod publish;
pub mod util;
