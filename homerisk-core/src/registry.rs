use serde::{Deserialize, Serialize};

/// The fixed collector registry.
///
/// Single source of truth shared by record initialization, fan-out, fan-in,
/// and the timeout supervisor: the "all collectors terminal" check and the
/// required analysis categories are both derived from [`CollectorKind::ALL`],
/// never from a second hardcoded list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorKind {
    Utilities,
    Security,
    Connectivity,
}

impl CollectorKind {
    pub const ALL: [CollectorKind; 3] = [
        CollectorKind::Utilities,
        CollectorKind::Security,
        CollectorKind::Connectivity,
    ];

    /// Registry name; also the key in `collector_results` and the name of
    /// the analysis category this collector feeds.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorKind::Utilities => "utilities",
            CollectorKind::Security => "security",
            CollectorKind::Connectivity => "connectivity",
        }
    }

    /// Broker topic this collector consumes.
    pub fn topic(&self) -> &'static str {
        match self {
            CollectorKind::Utilities => "scan-utilities",
            CollectorKind::Security => "scan-security",
            CollectorKind::Connectivity => "scan-connectivity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }

    /// Analysis categories the summarizer must populate.
    pub fn required_categories() -> Vec<&'static str> {
        Self::ALL.iter().map(CollectorKind::as_str).collect()
    }
}

impl std::fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
