use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity attached to scans and findings.
///
/// Values outside the closed set decode as `Unknown` and render as "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    #[serde(other)]
    Unknown,
}

impl Severity {
    /// Every known severity, most severe first.
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Returns a numeric rank where lower values indicate higher severity.
    /// Critical = 0, High = 1, Medium = 2, Low = 3, Unknown = 4.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Unknown => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Unknown => "unknown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
            Severity::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which engine reported the finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSource {
    /// AI-discovered
    Strix,
    /// Rule-based template match
    Nuclei,
    #[serde(other)]
    Unknown,
}

impl FindingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingSource::Strix => "strix",
            FindingSource::Nuclei => "nuclei",
            FindingSource::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FindingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reported vulnerability belonging to a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,
    pub scan_id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub source: FindingSource,
    pub validated: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_rank_ordering() {
        assert!(Severity::Critical.rank() < Severity::High.rank());
        assert!(Severity::High.rank() < Severity::Medium.rank());
        assert!(Severity::Medium.rank() < Severity::Low.rank());
        assert!(Severity::Low.rank() < Severity::Unknown.rank());
    }

    #[test]
    fn test_unknown_severity_decodes() {
        let parsed: Severity = serde_json::from_str("\"catastrophic\"").unwrap();
        assert_eq!(parsed, Severity::Unknown);
        assert_eq!(parsed.to_string(), "unknown");
    }

    #[test]
    fn test_finding_wire_format() {
        let finding: Finding = serde_json::from_value(json!({
            "id": "f1",
            "scanId": "s1",
            "title": "Reflected XSS",
            "description": "q parameter is echoed unescaped",
            "severity": "high",
            "type": "strix",
            "validated": true,
            "createdAt": "2024-01-01T14:30:00Z"
        }))
        .unwrap();
        assert_eq!(finding.scan_id, "s1");
        assert_eq!(finding.source, FindingSource::Strix);
        assert_eq!(finding.severity, Severity::High);
        assert!(finding.validated);
    }

    #[test]
    fn test_unknown_source_decodes() {
        let parsed: FindingSource = serde_json::from_str("\"zap\"").unwrap();
        assert_eq!(parsed, FindingSource::Unknown);
    }
}
