//! Handlers for `moves` and `pickups`.

use super::{MoveAction, PickupAction};
use crate::{
    errors::StoreError,
    models::{MoveUpdate, NewMove, NewPickupLocation, PickupLocationUpdate},
    services::{inventory_service::InventoryService, kv_store::KvStore},
    validation::{validate_move_fields, validate_move_update},
};
use anyhow::Result;
use serde_json::{Value, json};

pub async fn run<S: KvStore>(service: &InventoryService<S>, action: MoveAction) -> Result<Value> {
    let moves = service.moves();
    let value = match action {
        MoveAction::List => serde_json::to_value(moves.list().await?)?,
        MoveAction::Show { id } => {
            let found = moves
                .get(&id)
                .await?
                .ok_or_else(|| StoreError::move_not_found(&id))?;
            serde_json::to_value(found)?
        }
        MoveAction::Create {
            name,
            departure_address,
            arrival_address,
        } => {
            let fields = NewMove {
                name,
                departure_address,
                arrival_address,
            };
            validate_move_fields(&fields)?;
            serde_json::to_value(moves.create(fields).await?)?
        }
        MoveAction::Update {
            id,
            name,
            departure_address,
            arrival_address,
        } => {
            let update = MoveUpdate {
                name,
                departure_address,
                arrival_address,
                ..Default::default()
            };
            validate_move_update(&update)?;
            serde_json::to_value(moves.update(&id, update).await?)?
        }
        MoveAction::Delete { id, keep_packages } => {
            if keep_packages {
                if !moves.delete(&id).await? {
                    return Err(StoreError::move_not_found(&id).into());
                }
                json!({ "deleted": id, "packagesRemoved": 0 })
            } else {
                let removed = service.delete_move(&id).await?;
                json!({ "deleted": id, "packagesRemoved": removed })
            }
        }
        MoveAction::Share {
            id,
            user,
            permission,
        } => serde_json::to_value(moves.share(&id, &user, permission).await?)?,
        MoveAction::Unshare { id, user } => serde_json::to_value(moves.unshare(&id, &user).await?)?,
    };
    Ok(value)
}

pub async fn run_pickup<S: KvStore>(
    service: &InventoryService<S>,
    action: PickupAction,
) -> Result<Value> {
    let moves = service.moves();
    let value = match action {
        PickupAction::Add {
            move_id,
            address,
            notes,
        } => {
            let location = moves
                .add_pickup_location(&move_id, NewPickupLocation { address, notes })
                .await?;
            serde_json::to_value(location)?
        }
        PickupAction::Update {
            move_id,
            location_id,
            address,
            notes,
        } => {
            let updated = moves
                .update_pickup_location(
                    &move_id,
                    &location_id,
                    PickupLocationUpdate { address, notes },
                )
                .await?;
            serde_json::to_value(updated.pickup_locations)?
        }
        PickupAction::Delete {
            move_id,
            location_id,
        } => {
            let updated = moves.delete_pickup_location(&move_id, &location_id).await?;
            serde_json::to_value(updated.pickup_locations)?
        }
    };
    Ok(value)
}
