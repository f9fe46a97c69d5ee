//! Handlers for `packages`.

use super::{PackageAction, PackageFields};
use crate::{
    errors::StoreError,
    models::{Dimensions, NewPackage, PackageContentItem, PackageUpdate},
    services::{
        inventory_service::{InventoryService, PackageFilter},
        kv_store::KvStore,
        new_id,
    },
    validation::{validate_package_fields, validate_package_update, validate_photo},
};
use anyhow::{Context, Result, anyhow, bail};
use base64::{Engine as _, engine::general_purpose};
use serde_json::{Value, json};
use std::path::Path;

pub async fn run<S: KvStore>(
    service: &InventoryService<S>,
    action: PackageAction,
) -> Result<Value> {
    let value = match action {
        PackageAction::List { move_id } => {
            serde_json::to_value(service.packages(&move_id).list().await?)?
        }
        PackageAction::Show {
            move_id,
            package_id,
        } => {
            let found = service
                .packages(&move_id)
                .get(&package_id)
                .await?
                .ok_or_else(|| StoreError::package_not_found(&package_id))?;
            serde_json::to_value(found)?
        }
        PackageAction::Add { move_id, fields } => {
            let new_package = new_package_from(fields).await?;
            validate_package_fields(&new_package)?;
            serde_json::to_value(service.create_package(&move_id, new_package).await?)?
        }
        PackageAction::Update {
            move_id,
            package_id,
            fields,
        } => {
            let current = service
                .packages(&move_id)
                .get(&package_id)
                .await?
                .ok_or_else(|| StoreError::package_not_found(&package_id))?;
            let update = update_from(fields, current.dimensions).await?;
            validate_package_update(&update)?;
            serde_json::to_value(
                service
                    .update_package(&move_id, &package_id, update)
                    .await?,
            )?
        }
        PackageAction::Delete {
            move_id,
            package_id,
        } => {
            let removed = service.delete_package(&move_id, &package_id).await?;
            json!({ "deleted": removed, "packageId": package_id })
        }
        PackageAction::NextId {
            move_id,
            package_type,
        } => {
            let next = service.packages(&move_id).next_id(package_type).await?;
            json!({ "nextId": next })
        }
        PackageAction::Search {
            move_id,
            term,
            package_type,
            status,
        } => {
            let filter = PackageFilter {
                term,
                package_type,
                status,
            };
            serde_json::to_value(service.search(&move_id, &filter).await?)?
        }
        PackageAction::Summary { move_id } => {
            serde_json::to_value(service.move_summary(&move_id).await?)?
        }
        PackageAction::Label {
            move_id,
            package_id,
        } => {
            let pkg = service
                .packages(&move_id)
                .get(&package_id)
                .await?
                .ok_or_else(|| StoreError::package_not_found(&package_id))?;
            service.record_label_generated(&move_id, &pkg.id).await;
            json!({
                "packageId": pkg.id,
                "type": pkg.package_type,
                "contentType": pkg.content_type,
                "roomOfOrigin": pkg.room_of_origin,
                "qrCodeValue": pkg.qr_code_value,
            })
        }
    };
    Ok(value)
}

async fn new_package_from(fields: PackageFields) -> Result<NewPackage> {
    let contents = contents_from(&fields.items, fields.photo.as_deref()).await?;
    Ok(NewPackage {
        package_type: fields
            .package_type
            .ok_or_else(|| anyhow!("--type is required"))?,
        content_type: fields.content_type.unwrap_or_default(),
        room_of_origin: fields.room.unwrap_or_default(),
        dimensions: Dimensions {
            length: fields.length.unwrap_or(0.0),
            width: fields.width.unwrap_or(0.0),
            height: fields.height.unwrap_or(0.0),
        },
        contents,
        location_status: fields.status.unwrap_or_default(),
    })
}

/// Only flags that were given end up in the update. Dimensions are merged
/// over the package's current ones.
async fn update_from(fields: PackageFields, current: Dimensions) -> Result<PackageUpdate> {
    let dimensions = if fields.length.is_some() || fields.width.is_some() || fields.height.is_some()
    {
        Some(Dimensions {
            length: fields.length.unwrap_or(current.length),
            width: fields.width.unwrap_or(current.width),
            height: fields.height.unwrap_or(current.height),
        })
    } else {
        None
    };
    let contents = if fields.items.is_empty() {
        if fields.photo.is_some() {
            bail!("--photo needs an --item to attach to");
        }
        None
    } else {
        Some(contents_from(&fields.items, fields.photo.as_deref()).await?)
    };
    Ok(PackageUpdate {
        package_type: fields.package_type,
        content_type: fields.content_type,
        room_of_origin: fields.room,
        dimensions,
        contents,
        location_status: fields.status,
    })
}

async fn contents_from(items: &[String], photo: Option<&Path>) -> Result<Vec<PackageContentItem>> {
    let mut contents = items
        .iter()
        .map(|raw| parse_item(raw))
        .collect::<Result<Vec<_>>>()?;
    if let Some(path) = photo {
        let last = contents
            .last_mut()
            .ok_or_else(|| anyhow!("--photo needs an --item to attach to"))?;
        last.photo = Some(photo_data_url(path).await?);
    }
    Ok(contents)
}

/// `name` or `name:quantity`.
fn parse_item(raw: &str) -> Result<PackageContentItem> {
    let (name, quantity) = match raw.rsplit_once(':') {
        Some((name, qty)) => (
            name,
            qty.trim()
                .parse::<u32>()
                .with_context(|| format!("invalid quantity in item `{}`", raw))?,
        ),
        None => (raw, 1),
    };
    Ok(PackageContentItem {
        id: new_id(),
        name: name.trim().to_string(),
        quantity,
        photo: None,
    })
}

async fn photo_data_url(path: &Path) -> Result<String> {
    let mime = image_mime(path)
        .ok_or_else(|| anyhow!("{} is not a supported image type", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading photo {}", path.display()))?;
    let url = format!(
        "data:{};base64,{}",
        mime,
        general_purpose::STANDARD.encode(bytes)
    );
    validate_photo(&url)?;
    Ok(url)
}

fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
