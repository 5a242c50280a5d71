/// Entity collections the dashboard reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Projects,
    /// Targets of one project
    Targets,
    /// Scans of one project
    Scans,
    /// A single scan
    Scan,
    /// Findings of one scan
    Findings,
    /// Reports of one scan
    Reports,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Projects => "projects",
            Resource::Targets => "targets",
            Resource::Scans => "scans",
            Resource::Scan => "scan",
            Resource::Findings => "findings",
            Resource::Reports => "reports",
        }
    }

    /// Whether a read of this resource needs a parent or entity id.
    pub fn requires_scope(&self) -> bool {
        !matches!(self, Resource::Projects)
    }
}

/// Identifies one cacheable read: a resource plus its scoping id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: Resource,
    scope: Option<String>,
}

impl QueryKey {
    /// Build a key. An empty scope counts as missing.
    pub fn new(resource: Resource, scope: Option<&str>) -> Self {
        Self {
            resource,
            scope: scope.filter(|s| !s.is_empty()).map(str::to_string),
        }
    }

    pub fn projects() -> Self {
        Self::new(Resource::Projects, None)
    }

    pub fn targets(project_id: &str) -> Self {
        Self::new(Resource::Targets, Some(project_id))
    }

    pub fn scans(project_id: &str) -> Self {
        Self::new(Resource::Scans, Some(project_id))
    }

    pub fn scan(scan_id: &str) -> Self {
        Self::new(Resource::Scan, Some(scan_id))
    }

    pub fn findings(scan_id: &str) -> Self {
        Self::new(Resource::Findings, Some(scan_id))
    }

    pub fn reports(scan_id: &str) -> Self {
        Self::new(Resource::Reports, Some(scan_id))
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// A read is enabled only once every id it is scoped by is known.
    pub fn is_enabled(&self) -> bool {
        !self.resource.requires_scope() || self.scope.is_some()
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}/{}", self.resource.as_str(), scope),
            None => f.write_str(self.resource.as_str()),
        }
    }
}
