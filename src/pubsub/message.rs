//! Messages emitted by the recorder for every resource lifecycle event
//!
//! Adds and deletes carry full source rows. Updates carry a sparse
//! per-kind FieldsUpdate where each field records old and new values, plus
//! the updated source row.

use ressync_common::model::{
    Network, Pod, PodCluster, PodIngress, PodNamespace, PodService, Region, Vm, Vpc,
};
use std::fmt::Debug;

/// Old and new value of one field, with a cached "changed" flag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldChange<T> {
    different: bool,
    old: T,
    new: T,
}

impl<T: Clone + PartialEq> FieldChange<T> {
    pub fn between(old: &T, new: &T) -> Self {
        Self {
            different: old != new,
            old: old.clone(),
            new: new.clone(),
        }
    }

    pub fn set(&mut self, old: T, new: T) {
        self.different = old != new;
        self.old = old;
        self.new = new;
    }

    pub fn is_different(&self) -> bool {
        self.different
    }

    pub fn old_value(&self) -> &T {
        &self.old
    }

    pub fn new_value(&self) -> &T {
        &self.new
    }
}

/// Identity of the resource a FieldsUpdate refers to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageKey {
    pub id: i32,
    pub lcuuid: String,
}

pub trait ChangedFields: Debug + Send + Sync + 'static {
    fn key(&self) -> &MessageKey;

    fn has_changes(&self) -> bool;
}

/// Batch of newly recorded resources
#[derive(Debug, Clone, PartialEq)]
pub struct Added<S> {
    pub items: Vec<S>,
}

/// One updated resource
#[derive(Debug, Clone, PartialEq)]
pub struct Updated<S, F> {
    pub fields: F,
    /// Source row after the update
    pub new: S,
}

/// Batch of deleted resources
#[derive(Debug, Clone, PartialEq)]
pub struct Deleted<S> {
    pub items: Vec<S>,
    /// Rows were kept with a deletion marker rather than removed
    pub soft_delete: bool,
}

macro_rules! fields_update {
    ($name:ident for $source:ident { $($field:ident: $ty:ty),+ $(,)? }) => {
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            pub key: MessageKey,
            $(pub $field: FieldChange<$ty>,)+
        }

        impl $name {
            pub fn diff(old: &$source, new: &$source) -> Self {
                Self {
                    key: MessageKey {
                        id: old.id,
                        lcuuid: old.lcuuid.clone(),
                    },
                    $($field: FieldChange::between(&old.$field, &new.$field),)+
                }
            }
        }

        impl ChangedFields for $name {
            fn key(&self) -> &MessageKey {
                &self.key
            }

            fn has_changes(&self) -> bool {
                false $(|| self.$field.is_different())+
            }
        }
    };
}

fields_update!(RegionFieldsUpdate for Region {
    name: String,
    label: String,
});

fields_update!(VpcFieldsUpdate for Vpc {
    name: String,
    label: String,
    cidr: String,
    region_id: i32,
});

fields_update!(NetworkFieldsUpdate for Network {
    name: String,
    label: String,
    segmentation_id: i32,
    vpc_id: i32,
    region_id: i32,
});

fields_update!(VmFieldsUpdate for Vm {
    name: String,
    label: String,
    ip: String,
    state: i32,
    vpc_id: i32,
    region_id: i32,
});

fields_update!(PodClusterFieldsUpdate for PodCluster {
    name: String,
    cluster_name: String,
    version: String,
    vpc_id: i32,
    region_id: i32,
});

fields_update!(PodNamespaceFieldsUpdate for PodNamespace {
    name: String,
    pod_cluster_id: i32,
    region_id: i32,
});

fields_update!(PodFieldsUpdate for Pod {
    name: String,
    label: String,
    state: i32,
    pod_cluster_id: i32,
    pod_namespace_id: i32,
    vpc_id: i32,
});

fields_update!(PodIngressFieldsUpdate for PodIngress {
    name: String,
    pod_cluster_id: i32,
    pod_namespace_id: i32,
    region_id: i32,
});

fields_update!(PodServiceFieldsUpdate for PodService {
    name: String,
    service_cluster_ip: String,
    pod_cluster_id: i32,
    pod_namespace_id: i32,
    vpc_id: i32,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_change_detects_difference() {
        let same = FieldChange::between(&3, &3);
        assert!(!same.is_different());

        let mut changed = FieldChange::default();
        changed.set("a".to_string(), "b".to_string());
        assert!(changed.is_different());
        assert_eq!(changed.old_value(), "a");
        assert_eq!(changed.new_value(), "b");
    }

    #[test]
    fn test_diff_only_flags_changed_fields() {
        let old = PodIngress {
            id: 42,
            lcuuid: "ing".to_string(),
            name: "svc-ingress".to_string(),
            pod_cluster_id: 7,
            pod_namespace_id: 3,
            ..Default::default()
        };
        let new = PodIngress {
            name: "svc-ingress-v2".to_string(),
            ..old.clone()
        };

        let update = PodIngressFieldsUpdate::diff(&old, &new);
        assert_eq!(update.key.id, 42);
        assert!(update.has_changes());
        assert!(update.name.is_different());
        assert!(!update.pod_cluster_id.is_different());
        assert!(!PodIngressFieldsUpdate::diff(&old, &old).has_changes());
    }
}
