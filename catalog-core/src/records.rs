//! Catalog domain records
//!
//! Plain data as returned by the catalog service. The cache never inspects
//! these beyond cloning and (optionally) serializing them.

use crate::{ResourceKind, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reusable listing template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub template_id: Uuid,
    pub name: String,
    pub category: String,
    pub updated_at: Timestamp,
}

/// A shop listed in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub shop_id: Uuid,
    pub name: String,
    pub city: String,
    pub is_open: bool,
}

/// An editorial guide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    pub guide_id: Uuid,
    pub title: String,
    pub slug: String,
    pub published_at: Option<Timestamp>,
}

/// Any record the catalog service can return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogRecord {
    Template(Template),
    Shop(Shop),
    Guide(Guide),
}

impl CatalogRecord {
    /// The resource kind this record is listed under.
    pub fn kind(&self) -> ResourceKind {
        match self {
            CatalogRecord::Template(_) => ResourceKind::Templates,
            CatalogRecord::Shop(_) => ResourceKind::Shops,
            CatalogRecord::Guide(_) => ResourceKind::Guides,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            CatalogRecord::Template(t) => t.template_id,
            CatalogRecord::Shop(s) => s.shop_id,
            CatalogRecord::Guide(g) => g.guide_id,
        }
    }
}

impl From<Template> for CatalogRecord {
    fn from(value: Template) -> Self {
        CatalogRecord::Template(value)
    }
}

impl From<Shop> for CatalogRecord {
    fn from(value: Shop) -> Self {
        CatalogRecord::Shop(value)
    }
}

impl From<Guide> for CatalogRecord {
    fn from(value: Guide) -> Self {
        CatalogRecord::Guide(value)
    }
}
