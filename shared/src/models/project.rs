//! Project Model

use serde::{Deserialize, Serialize};

/// A named collection of approved images.
///
/// `storage_prefix` is derived once from the name at creation and never
/// changes. `image_count` is a denormalized cache reconciled on listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub storage_prefix: String,
    pub image_count: i64,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create project payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectCreate {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}
