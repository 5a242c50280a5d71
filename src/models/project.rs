use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::scan::Scan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Web,
    Api,
    Codebase,
    #[serde(other)]
    Unknown,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Web => "web",
            TargetType::Api => "api",
            TargetType::Codebase => "codebase",
            TargetType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Active,
    Inactive,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub target_type: TargetType,
    pub status: TargetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub scans: Vec<Scan>,
}
