use serde::{Deserialize, Serialize};

/// Scope of one reconciliation: which team/domain/sub-domain a cache and
/// the CH rows it produces belong to.
///
/// An empty `sub_domain_id` means the domain itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub org_id: i32,
    pub team_id: String,
    pub domain_id: String,
    pub sub_domain_id: String,
}

impl Metadata {
    pub fn new(team_id: impl Into<String>, domain_id: impl Into<String>) -> Self {
        Self {
            org_id: 1,
            team_id: team_id.into(),
            domain_id: domain_id.into(),
            sub_domain_id: String::new(),
        }
    }

    pub fn with_sub_domain(mut self, sub_domain_id: impl Into<String>) -> Self {
        self.sub_domain_id = sub_domain_id.into();
        self
    }
}

impl std::fmt::Display for Metadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.sub_domain_id.is_empty() {
            write!(f, "team={} domain={}", self.team_id, self.domain_id)
        } else {
            write!(
                f,
                "team={} domain={} sub_domain={}",
                self.team_id, self.domain_id, self.sub_domain_id
            )
        }
    }
}
