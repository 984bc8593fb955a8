use serde::{Deserialize, Serialize};

/// One outbound URL in the fallback rotation pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackCandidate {
    pub id: i64,
    pub url: String,
    /// Empty means unrestricted
    pub allowed_countries: Vec<String>,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFallbackCandidate {
    pub url: String,
    #[serde(default)]
    pub allowed_countries: Vec<String>,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFallbackCandidate {
    pub url: Option<String>,
    pub allowed_countries: Option<Vec<String>>,
    pub display_order: Option<i64>,
    pub is_active: Option<bool>,
}
