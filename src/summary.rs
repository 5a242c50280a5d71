//! Read-only views derived from cached entities.

use chrono::{DateTime, Utc};
use crate::models::{Finding, FindingSource, Project, Scan, Severity, TargetStatus};

/// Number of scans shown in the "recent scans" list.
pub const RECENT_SCAN_LIMIT: usize = 5;

/// Scans that are pending or running.
pub fn active_scans(scans: &[Scan]) -> Vec<&Scan> {
    scans.iter().filter(|s| s.status.is_in_progress()).collect()
}

/// The first `limit` scans in the order the API returned them.
pub fn recent_scans(scans: &[Scan], limit: usize) -> &[Scan] {
    &scans[..scans.len().min(limit)]
}

/// The first scan whose start time is still ahead of `now`.
pub fn next_scheduled_run(scans: &[Scan], now: DateTime<Utc>) -> Option<&Scan> {
    scans.iter().find(|s| s.started_at.is_some_and(|at| at > now))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
}

impl SeverityCounts {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            counts.add(finding.severity);
        }
        counts
    }

    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Unknown => self.unknown += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Unknown => self.unknown,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.unknown
    }

    /// Most severe level with at least one finding.
    pub fn highest(&self) -> Option<Severity> {
        Severity::ALL.into_iter().find(|s| self.get(*s) > 0)
    }
}

/// Headline numbers for one scan's findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindingStats {
    pub total: usize,
    pub validated: usize,
    pub by_severity: SeverityCounts,
}

impl FindingStats {
    pub fn from_findings(findings: &[Finding]) -> Self {
        Self {
            total: findings.len(),
            validated: findings.iter().filter(|f| f.validated).count(),
            by_severity: SeverityCounts::from_findings(findings),
        }
    }
}

/// Findings grouped by the scanner that produced them.
#[derive(Debug, Default)]
pub struct FindingsBySource<'a> {
    pub strix: Vec<&'a Finding>,
    pub nuclei: Vec<&'a Finding>,
    pub other: Vec<&'a Finding>,
}

pub fn split_by_source(findings: &[Finding]) -> FindingsBySource<'_> {
    let mut split = FindingsBySource::default();
    for finding in findings {
        match finding.source {
            FindingSource::Strix => split.strix.push(finding),
            FindingSource::Nuclei => split.nuclei.push(finding),
            FindingSource::Unknown => split.other.push(finding),
        }
    }
    split
}

/// Most severe first; ties keep their original order.
pub fn sort_by_severity(findings: &mut [Finding]) {
    findings.sort_by_key(|f| f.severity.rank());
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOverview {
    pub target_count: usize,
    pub active_targets: usize,
    pub scan_count: usize,
    pub active_scans: usize,
    pub last_scan_at: Option<DateTime<Utc>>,
}

impl ProjectOverview {
    pub fn of(project: &Project) -> Self {
        Self {
            target_count: project.targets.len(),
            active_targets: project
                .targets
                .iter()
                .filter(|t| t.status == TargetStatus::Active)
                .count(),
            scan_count: project.scans.len(),
            active_scans: active_scans(&project.scans).len(),
            last_scan_at: project.scans.iter().map(|s| s.created_at).max(),
        }
    }
}

/// Totals shown on the dashboard landing view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub projects: usize,
    pub scans: usize,
    pub active_scans: usize,
    pub findings: SeverityCounts,
}

impl DashboardStats {
    pub fn compute(projects: &[Project], scans: &[Scan]) -> Self {
        let mut findings = SeverityCounts::default();
        for finding in scans.iter().flat_map(|s| s.findings.iter()) {
            findings.add(finding.severity);
        }
        Self {
            projects: projects.len(),
            scans: scans.len(),
            active_scans: active_scans(scans).len(),
            findings,
        }
    }
}

/// Markdown table of finding counts per severity.
pub fn format_severity_table(counts: &SeverityCounts) -> String {
    let mut out = String::from("| Severity | Count |\n|---|---|\n");
    for severity in Severity::ALL {
        out.push_str(&format!("| {} | {} |\n", severity.label(), counts.get(severity)));
    }
    if counts.unknown > 0 {
        out.push_str(&format!("| {} | {} |\n", Severity::Unknown.label(), counts.unknown));
    }
    out.push_str(&format!("| **Total** | **{}** |\n", counts.total()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::models::{ScanStatus, Target, TargetType};

    fn finding(id: &str, severity: Severity, source: FindingSource, validated: bool) -> Finding {
        Finding {
            id: id.into(),
            scan_id: "s1".into(),
            title: format!("finding {}", id),
            description: String::new(),
            severity,
            source,
            validated,
            created_at: Utc::now(),
        }
    }

    fn scan(id: &str, status: ScanStatus, created_at: DateTime<Utc>) -> Scan {
        Scan {
            id: id.into(),
            project_id: "p1".into(),
            target_id: "t1".into(),
            status,
            severity: Severity::Low,
            findings: Vec::new(),
            started_at: None,
            completed_at: None,
            created_at,
        }
    }

    #[test]
    fn test_active_scans() {
        let now = Utc::now();
        let scans = vec![
            scan("a", ScanStatus::Running, now),
            scan("b", ScanStatus::Completed, now),
            scan("c", ScanStatus::Pending, now),
            scan("d", ScanStatus::Unknown, now),
        ];
        let ids: Vec<&str> = active_scans(&scans).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_recent_scans_caps_length() {
        let now = Utc::now();
        let scans: Vec<Scan> = (0..7).map(|i| scan(&i.to_string(), ScanStatus::Completed, now)).collect();
        assert_eq!(recent_scans(&scans, RECENT_SCAN_LIMIT).len(), 5);
        assert_eq!(recent_scans(&scans[..2], RECENT_SCAN_LIMIT).len(), 2);
    }

    #[test]
    fn test_next_scheduled_run() {
        let now = Utc::now();
        let mut past = scan("past", ScanStatus::Completed, now);
        past.started_at = Some(now - Duration::hours(1));
        let mut future = scan("future", ScanStatus::Pending, now);
        future.started_at = Some(now + Duration::hours(1));
        let scans = vec![past, scan("unstarted", ScanStatus::Pending, now), future];
        assert_eq!(next_scheduled_run(&scans, now).map(|s| s.id.as_str()), Some("future"));
    }

    #[test]
    fn test_finding_stats() {
        let findings = vec![
            finding("1", Severity::Critical, FindingSource::Strix, true),
            finding("2", Severity::High, FindingSource::Nuclei, false),
            finding("3", Severity::High, FindingSource::Strix, true),
            finding("4", Severity::Unknown, FindingSource::Unknown, false),
        ];
        let stats = FindingStats::from_findings(&findings);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.validated, 2);
        assert_eq!(stats.by_severity.critical, 1);
        assert_eq!(stats.by_severity.high, 2);
        assert_eq!(stats.by_severity.unknown, 1);
        assert_eq!(stats.by_severity.highest(), Some(Severity::Critical));
    }

    #[test]
    fn test_highest_of_empty_is_none() {
        assert_eq!(SeverityCounts::default().highest(), None);
    }

    #[test]
    fn test_split_by_source() {
        let findings = vec![
            finding("1", Severity::Low, FindingSource::Strix, false),
            finding("2", Severity::Low, FindingSource::Nuclei, false),
            finding("3", Severity::Low, FindingSource::Unknown, false),
            finding("4", Severity::Low, FindingSource::Strix, false),
        ];
        let split = split_by_source(&findings);
        assert_eq!(split.strix.len(), 2);
        assert_eq!(split.nuclei.len(), 1);
        assert_eq!(split.other.len(), 1);
    }

    #[test]
    fn test_sort_by_severity_is_stable() {
        let mut findings = vec![
            finding("low", Severity::Low, FindingSource::Strix, false),
            finding("crit-a", Severity::Critical, FindingSource::Strix, false),
            finding("unknown", Severity::Unknown, FindingSource::Strix, false),
            finding("crit-b", Severity::Critical, FindingSource::Nuclei, false),
        ];
        sort_by_severity(&mut findings);
        let ids: Vec<&str> = findings.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["crit-a", "crit-b", "low", "unknown"]);
    }

    #[test]
    fn test_project_overview() {
        let now = Utc::now();
        let target = |id: &str, status| Target {
            id: id.into(),
            project_id: "p1".into(),
            name: id.into(),
            url: "https://example.com".into(),
            target_type: TargetType::Web,
            status,
            created_at: now,
            updated_at: now,
        };
        let project = Project {
            id: "p1".into(),
            name: "Acme".into(),
            description: None,
            created_at: now,
            updated_at: now,
            targets: vec![target("t1", TargetStatus::Active), target("t2", TargetStatus::Inactive)],
            scans: vec![
                scan("old", ScanStatus::Completed, now - Duration::days(2)),
                scan("new", ScanStatus::Running, now),
            ],
        };
        let overview = ProjectOverview::of(&project);
        assert_eq!(overview.target_count, 2);
        assert_eq!(overview.active_targets, 1);
        assert_eq!(overview.scan_count, 2);
        assert_eq!(overview.active_scans, 1);
        assert_eq!(overview.last_scan_at, Some(now));
    }

    #[test]
    fn test_project_without_scans_has_no_last_scan() {
        let now = Utc::now();
        let project = Project {
            id: "p1".into(),
            name: "Empty".into(),
            description: None,
            created_at: now,
            updated_at: now,
            targets: Vec::new(),
            scans: Vec::new(),
        };
        assert_eq!(ProjectOverview::of(&project).last_scan_at, None);
    }

    #[test]
    fn test_dashboard_stats() {
        let now = Utc::now();
        let mut done = scan("a", ScanStatus::Completed, now);
        done.findings = vec![
            finding("1", Severity::High, FindingSource::Strix, true),
            finding("2", Severity::Low, FindingSource::Nuclei, false),
        ];
        let scans = vec![done, scan("b", ScanStatus::Running, now)];
        let stats = DashboardStats::compute(&[], &scans);
        assert_eq!(stats.projects, 0);
        assert_eq!(stats.scans, 2);
        assert_eq!(stats.active_scans, 1);
        assert_eq!(stats.findings.total(), 2);
    }

    #[test]
    fn test_severity_table() {
        let counts = SeverityCounts { critical: 1, high: 2, ..Default::default() };
        let table = format_severity_table(&counts);
        assert!(table.contains("| Critical | 1 |"));
        assert!(table.contains("| High | 2 |"));
        assert!(table.contains("| **Total** | **3** |"));
        assert!(!table.contains("Unknown"));
    }
}
