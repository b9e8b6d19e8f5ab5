use serde::{Deserialize, Serialize};

/// Tag naming one tracked resource type.
///
/// `ALL` lists kinds parents-first: adds are applied in this order so parent
/// references resolve, deletes in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Region,
    Vpc,
    Network,
    Vm,
    PodCluster,
    PodNamespace,
    Pod,
    PodIngress,
    PodService,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Region,
        ResourceKind::Vpc,
        ResourceKind::Network,
        ResourceKind::Vm,
        ResourceKind::PodCluster,
        ResourceKind::PodNamespace,
        ResourceKind::Pod,
        ResourceKind::PodIngress,
        ResourceKind::PodService,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Region => "region",
            ResourceKind::Vpc => "vpc",
            ResourceKind::Network => "network",
            ResourceKind::Vm => "vm",
            ResourceKind::PodCluster => "pod_cluster",
            ResourceKind::PodNamespace => "pod_namespace",
            ResourceKind::Pod => "pod",
            ResourceKind::PodIngress => "pod_ingress",
            ResourceKind::PodService => "pod_service",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_parents_first() {
        let pos = |k: ResourceKind| ResourceKind::ALL.iter().position(|x| *x == k).unwrap();
        assert!(pos(ResourceKind::Region) < pos(ResourceKind::Vpc));
        assert!(pos(ResourceKind::Vpc) < pos(ResourceKind::Network));
        assert!(pos(ResourceKind::Vpc) < pos(ResourceKind::Vm));
        assert!(pos(ResourceKind::Vpc) < pos(ResourceKind::PodCluster));
        assert!(pos(ResourceKind::PodCluster) < pos(ResourceKind::PodNamespace));
        assert!(pos(ResourceKind::PodNamespace) < pos(ResourceKind::Pod));
        assert!(pos(ResourceKind::PodNamespace) < pos(ResourceKind::PodIngress));
        assert!(pos(ResourceKind::PodNamespace) < pos(ResourceKind::PodService));
    }

    #[test]
    fn test_all_follows_declaration_order() {
        let mut sorted = ResourceKind::ALL;
        sorted.sort();
        assert_eq!(sorted, ResourceKind::ALL);
    }

    #[test]
    fn test_display_matches_serde() {
        let json = serde_json::to_string(&ResourceKind::PodIngress).unwrap();
        assert_eq!(json, format!("\"{}\"", ResourceKind::PodIngress));
    }
}
