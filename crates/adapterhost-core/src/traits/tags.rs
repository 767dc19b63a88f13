// SPDX-FileCopyrightText: 2026 Adapterhost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tag lookup and snapshot read feature contracts.
//!
//! These are interfaces only; the host does not implement any data-source logic.

use async_trait::async_trait;

use crate::error::HostError;
use crate::traits::feature::Feature;
use crate::types::{CallerContext, FindTagsRequest, TagDefinition, TagValueQueryResult};

/// Looks up tag definitions by id or name.
#[async_trait]
pub trait TagInfo: Feature {
    /// Returns definitions for the requested tags. Unknown tags are omitted.
    async fn get_tags(
        &self,
        context: &CallerContext,
        tags: &[String],
    ) -> Result<Vec<TagDefinition>, HostError>;
}

/// Searches the tags of a data source.
#[async_trait]
pub trait TagSearch: Feature {
    async fn find_tags(
        &self,
        context: &CallerContext,
        request: &FindTagsRequest,
    ) -> Result<Vec<TagDefinition>, HostError>;
}

/// Polls current (snapshot) values of tags.
#[async_trait]
pub trait ReadSnapshotTagValues: Feature {
    async fn read_snapshot_tag_values(
        &self,
        context: &CallerContext,
        tags: &[String],
    ) -> Result<Vec<TagValueQueryResult>, HostError>;
}
