use reqwest::Url;
use serde::{Deserialize, Serialize};
use crate::errors::ClientError;
use super::project::TargetType;
use super::report::ReportFormat;

/// Client-side schema check run before a payload is dispatched. A failure
/// never reaches the network.
pub trait Validate {
    fn validate(&self) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), description: None }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Validate for NewProject {
    fn validate(&self) -> Result<(), ClientError> {
        if self.name.trim().is_empty() {
            return Err(ClientError::Validation("Project name is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTarget {
    pub project_id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub target_type: TargetType,
}

impl NewTarget {
    pub fn new(project_id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
            url: url.into(),
            target_type: TargetType::default(),
        }
    }

    pub fn with_type(mut self, target_type: TargetType) -> Self {
        self.target_type = target_type;
        self
    }
}

impl Validate for NewTarget {
    fn validate(&self) -> Result<(), ClientError> {
        if self.project_id.trim().is_empty() {
            return Err(ClientError::Validation("Project is required".into()));
        }
        if self.name.trim().is_empty() {
            return Err(ClientError::Validation("Target name is required".into()));
        }
        let valid_url = Url::parse(&self.url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !valid_url {
            return Err(ClientError::Validation("Must be a valid URL".into()));
        }
        if self.target_type == TargetType::Unknown {
            return Err(ClientError::Validation("Target type must be web, api or codebase".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScan {
    pub project_id: String,
    pub target_id: String,
}

impl NewScan {
    pub fn new(project_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self { project_id: project_id.into(), target_id: target_id.into() }
    }
}

impl Validate for NewScan {
    fn validate(&self) -> Result<(), ClientError> {
        if self.project_id.trim().is_empty() {
            return Err(ClientError::Validation("Project is required".into()));
        }
        if self.target_id.trim().is_empty() {
            return Err(ClientError::Validation("Target is required".into()));
        }
        Ok(())
    }
}

/// Body of the report generation request. The scan id travels in the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateReport {
    #[serde(skip)]
    pub scan_id: String,
    pub format: ReportFormat,
}

impl GenerateReport {
    pub fn new(scan_id: impl Into<String>, format: ReportFormat) -> Self {
        Self { scan_id: scan_id.into(), format }
    }
}

impl Validate for GenerateReport {
    fn validate(&self) -> Result<(), ClientError> {
        if self.scan_id.trim().is_empty() {
            return Err(ClientError::Validation("Scan is required".into()));
        }
        if self.format == ReportFormat::Unknown {
            return Err(ClientError::Validation("Report format must be pdf, html or json".into()));
        }
        Ok(())
    }
}
