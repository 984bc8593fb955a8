use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "desktop" => Ok(DeviceType::Desktop),
            "mobile" => Ok(DeviceType::Mobile),
            "tablet" => Ok(DeviceType::Tablet),
            other => Err(format!("unknown device type '{other}'")),
        }
    }
}

/// A recorded click on a target link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickEvent {
    pub id: i64,
    pub link_id: i64,
    pub session_id: String,
    pub device_type: DeviceType,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub ip: Option<String>,
    pub referrer: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewClickEvent {
    pub link_id: i64,
    pub session_id: String,
    pub device_type: DeviceType,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub ip: Option<String>,
    pub referrer: Option<String>,
}

/// Per-browser session summary, upserted on every visit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub first_seen: i64,
    pub last_seen: i64,
    pub visit_count: i64,
    pub device_type: DeviceType,
    pub country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionVisit {
    pub session_id: String,
    pub device_type: DeviceType,
    pub country: Option<String>,
}
