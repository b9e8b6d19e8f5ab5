//! Networks projected into `ch_subnet`, keyed by network ID

use crate::chdb::{OnConflict, UpdateInfo};
use crate::pubsub::message::NetworkFieldsUpdate;
use crate::recorder::resource::Networks;
use crate::tagrecorder::subscriber::{ChProjector, ChTx};
use crate::Result;
use ressync_common::ch::ChSubnet;
use ressync_common::model::Network;
use ressync_common::{ChKey, IdKey, Metadata, SourceRow};
use serde_json::json;

#[derive(Debug, Default)]
pub struct SubnetProjector;

impl ChProjector for SubnetProjector {
    type Resource = Networks;
    type Target = ChSubnet;

    fn source_to_target(&self, md: &Metadata, source: &Network) -> (Vec<IdKey>, Vec<ChSubnet>) {
        let row = ChSubnet {
            id: source.id,
            name: source.display_name(),
            l3_epc_id: source.vpc_id,
            team_id: md.team_id.clone(),
            domain_id: md.domain_id.clone(),
            sub_domain_id: md.sub_domain_id.clone(),
        };
        (vec![IdKey::new(source.id)], vec![row])
    }

    fn on_resource_updated(
        &self,
        source_id: i32,
        fields: &NetworkFieldsUpdate,
        tx: &ChTx<'_, ChSubnet>,
    ) -> Result<()> {
        let mut info = UpdateInfo::new();
        if fields.name.is_different() {
            info.insert("name", json!(fields.name.new_value()));
        }
        if fields.vpc_id.is_different() {
            info.insert("l3_epc_id", json!(fields.vpc_id.new_value()));
        }
        tx.update_or_sync(&IdKey::new(source_id), info)
    }

    fn soft_deleted_targets_updated(
        &self,
        targets: &[ChSubnet],
        tx: &ChTx<'_, ChSubnet>,
    ) -> Result<()> {
        tx.upsert(targets, &OnConflict::update_columns(IdKey::COLUMNS, &["name"]))?;
        Ok(())
    }
}
