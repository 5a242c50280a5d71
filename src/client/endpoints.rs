//! REST paths consumed by the dashboard, relative to the API base URL.

pub fn projects() -> String {
    "/api/projects".to_string()
}

pub fn project_targets(project_id: &str) -> String {
    format!("/api/projects/{}/targets", project_id)
}

pub fn project_scans(project_id: &str) -> String {
    format!("/api/projects/{}/scans", project_id)
}

pub fn scans() -> String {
    "/api/scans".to_string()
}

pub fn scan(scan_id: &str) -> String {
    format!("/api/scans/{}", scan_id)
}

pub fn scan_findings(scan_id: &str) -> String {
    format!("/api/scans/{}/findings", scan_id)
}

pub fn scan_reports(scan_id: &str) -> String {
    format!("/api/scans/{}/reports", scan_id)
}
