use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Email-capture interstitial shown before a target link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PrelanderConfig {
    pub id: i64,
    pub link_id: i64,
    pub headline: String,
    pub description: Option<String>,
    pub button_text: String,
    pub is_enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrelanderInput {
    pub headline: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_button_text")]
    pub button_text: String,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_button_text() -> String {
    "Continue".to_string()
}

fn default_enabled() -> bool {
    true
}

/// An email address captured by a prelander
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PrelanderLead {
    pub id: i64,
    pub link_id: i64,
    pub prelander_id: i64,
    pub email: String,
    pub session_id: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewLead {
    pub link_id: i64,
    pub prelander_id: i64,
    pub email: String,
    pub session_id: Option<String>,
}
