use serde::{Deserialize, Serialize};

/// A single-destination link that visitors reach through `/go`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetLink {
    pub id: i64,
    pub title: Option<String>,
    pub original_link: String,
    /// Allow-list of country names or wildcard tokens; empty means worldwide
    pub country_permissions: Vec<String>,
    pub fallback_link: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTargetLink {
    #[serde(default)]
    pub title: Option<String>,
    pub original_link: String,
    #[serde(default)]
    pub country_permissions: Vec<String>,
    #[serde(default)]
    pub fallback_link: Option<String>,
}

/// Partial update; an empty `fallback_link` clears it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTargetLink {
    pub title: Option<String>,
    pub original_link: Option<String>,
    pub country_permissions: Option<Vec<String>>,
    pub fallback_link: Option<String>,
}
