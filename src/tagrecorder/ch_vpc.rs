use crate::chdb::{OnConflict, UpdateInfo};
use crate::pubsub::message::VpcFieldsUpdate;
use crate::recorder::resource::Vpcs;
use crate::tagrecorder::subscriber::{ChProjector, ChTx};
use crate::Result;
use ressync_common::ch::ChVpc;
use ressync_common::model::Vpc;
use ressync_common::{ChKey, IdKey, Metadata, SourceRow};
use serde_json::json;

/// Projects VPCs into `ch_l3_epc`
#[derive(Debug, Default)]
pub struct VpcProjector;

impl ChProjector for VpcProjector {
    type Resource = Vpcs;
    type Target = ChVpc;

    fn source_to_target(&self, md: &Metadata, source: &Vpc) -> (Vec<IdKey>, Vec<ChVpc>) {
        let row = ChVpc {
            id: source.id,
            name: source.display_name(),
            uid: source.lcuuid.clone(),
            team_id: md.team_id.clone(),
            domain_id: md.domain_id.clone(),
            sub_domain_id: md.sub_domain_id.clone(),
        };
        (vec![IdKey::new(source.id)], vec![row])
    }

    fn on_resource_updated(
        &self,
        source_id: i32,
        fields: &VpcFieldsUpdate,
        tx: &ChTx<'_, ChVpc>,
    ) -> Result<()> {
        let mut info = UpdateInfo::new();
        if fields.name.is_different() {
            info.insert("name", json!(fields.name.new_value()));
        }
        tx.update_or_sync(&IdKey::new(source_id), info)
    }

    fn soft_deleted_targets_updated(&self, targets: &[ChVpc], tx: &ChTx<'_, ChVpc>) -> Result<()> {
        tx.upsert(targets, &OnConflict::update_columns(IdKey::COLUMNS, &["name"]))?;
        Ok(())
    }
}
