//! Form-level checks applied before data reaches the stores.
//!
//! The stores persist whatever they are given; the CLI runs these first.

use crate::{
    errors::ValidationError,
    models::{Dimensions, MoveUpdate, NewMove, NewPackage, PackageContentItem, PackageUpdate},
};
use base64::{Engine as _, engine::general_purpose};

/// Largest accepted decoded photo, 5 MiB.
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

pub fn validate_move_fields(fields: &NewMove) -> Result<(), ValidationError> {
    require("name", &fields.name)?;
    require("departureAddress", &fields.departure_address)?;
    require("arrivalAddress", &fields.arrival_address)?;
    Ok(())
}

/// Only the fields present in the update are checked.
pub fn validate_move_update(update: &MoveUpdate) -> Result<(), ValidationError> {
    if let Some(v) = &update.name {
        require("name", v)?;
    }
    if let Some(v) = &update.departure_address {
        require("departureAddress", v)?;
    }
    if let Some(v) = &update.arrival_address {
        require("arrivalAddress", v)?;
    }
    Ok(())
}

pub fn validate_package_fields(fields: &NewPackage) -> Result<(), ValidationError> {
    require("contentType", &fields.content_type)?;
    require("roomOfOrigin", &fields.room_of_origin)?;
    validate_dimensions(&fields.dimensions)?;
    validate_contents(&fields.contents)
}

/// Only the fields present in the update are checked.
pub fn validate_package_update(update: &PackageUpdate) -> Result<(), ValidationError> {
    if let Some(v) = &update.content_type {
        require("contentType", v)?;
    }
    if let Some(v) = &update.room_of_origin {
        require("roomOfOrigin", v)?;
    }
    if let Some(d) = &update.dimensions {
        validate_dimensions(d)?;
    }
    if let Some(items) = &update.contents {
        validate_contents(items)?;
    }
    Ok(())
}

pub fn validate_dimensions(d: &Dimensions) -> Result<(), ValidationError> {
    for (field, value) in [("length", d.length), ("width", d.width), ("height", d.height)] {
        // NaN fails this comparison too
        if !(value > 0.0) {
            return Err(ValidationError::NonPositiveDimension { field, value });
        }
    }
    Ok(())
}

fn validate_contents(items: &[PackageContentItem]) -> Result<(), ValidationError> {
    for item in items {
        require("contents.name", &item.name)?;
        if item.quantity == 0 {
            return Err(ValidationError::InvalidQuantity {
                name: item.name.clone(),
            });
        }
        if let Some(photo) = &item.photo {
            validate_photo(photo)?;
        }
    }
    Ok(())
}

/// Accept `data:image/<subtype>;base64,<payload>` up to `MAX_PHOTO_BYTES`.
pub fn validate_photo(data_url: &str) -> Result<(), ValidationError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or(ValidationError::InvalidPhotoType)?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or(ValidationError::InvalidPhotoType)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(ValidationError::InvalidPhotoEncoding)?;
    match mime.strip_prefix("image/") {
        Some(subtype) if !subtype.is_empty() => {}
        _ => return Err(ValidationError::InvalidPhotoType),
    }

    // Cheap upper bound before decoding a huge payload.
    let estimated = payload.len() / 4 * 3;
    if estimated > MAX_PHOTO_BYTES + 3 {
        return Err(ValidationError::PhotoTooLarge {
            size: estimated,
            max: MAX_PHOTO_BYTES,
        });
    }

    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| ValidationError::InvalidPhotoEncoding)?;
    if bytes.len() > MAX_PHOTO_BYTES {
        return Err(ValidationError::PhotoTooLarge {
            size: bytes.len(),
            max: MAX_PHOTO_BYTES,
        });
    }
    Ok(())
}

/// Volume in cubic metres from centimetre dimensions; 0 for degenerate boxes.
pub fn calculate_volume(d: &Dimensions) -> f64 {
    if d.length <= 0.0 || d.width <= 0.0 || d.height <= 0.0 {
        return 0.0;
    }
    d.length * d.width * d.height / 1_000_000.0
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationStatus, PackageType};

    fn dims(length: f64, width: f64, height: f64) -> Dimensions {
        Dimensions {
            length,
            width,
            height,
        }
    }

    #[test]
    fn dimensions_must_be_positive() {
        assert!(validate_dimensions(&dims(10.0, 10.0, 10.0)).is_ok());
        assert_eq!(
            validate_dimensions(&dims(10.0, 0.0, 10.0)),
            Err(ValidationError::NonPositiveDimension {
                field: "width",
                value: 0.0
            })
        );
        assert!(validate_dimensions(&dims(f64::NAN, 1.0, 1.0)).is_err());
    }

    #[test]
    fn volume_is_cubic_metres() {
        assert!((calculate_volume(&dims(100.0, 100.0, 100.0)) - 1.0).abs() < 1e-9);
        assert_eq!(calculate_volume(&dims(-1.0, 100.0, 100.0)), 0.0);
    }

    #[test]
    fn photo_must_be_an_image_data_url() {
        assert!(validate_photo("data:image/png;base64,aGVsbG8=").is_ok());
        assert_eq!(
            validate_photo("data:text/plain;base64,aGVsbG8="),
            Err(ValidationError::InvalidPhotoType)
        );
        assert_eq!(
            validate_photo("https://example.com/cat.png"),
            Err(ValidationError::InvalidPhotoType)
        );
        assert_eq!(
            validate_photo("data:image/png;base64,***"),
            Err(ValidationError::InvalidPhotoEncoding)
        );
    }

    #[test]
    fn oversized_photo_is_rejected() {
        let payload = general_purpose::STANDARD.encode(vec![0u8; MAX_PHOTO_BYTES + 1]);
        let url = format!("data:image/jpeg;base64,{}", payload);
        assert!(matches!(
            validate_photo(&url),
            Err(ValidationError::PhotoTooLarge { .. })
        ));

        let payload = general_purpose::STANDARD.encode(vec![0u8; MAX_PHOTO_BYTES]);
        let url = format!("data:image/jpeg;base64,{}", payload);
        assert!(validate_photo(&url).is_ok());
    }

    #[test]
    fn package_fields_check_contents() {
        let mut fields = NewPackage {
            package_type: PackageType::Box,
            content_type: "Books".into(),
            room_of_origin: "Study".into(),
            dimensions: dims(40.0, 30.0, 30.0),
            contents: vec![PackageContentItem {
                id: "i1".into(),
                name: "Novels".into(),
                quantity: 12,
                photo: None,
            }],
            location_status: LocationStatus::Departure,
        };
        assert!(validate_package_fields(&fields).is_ok());

        fields.contents[0].quantity = 0;
        assert_eq!(
            validate_package_fields(&fields),
            Err(ValidationError::InvalidQuantity {
                name: "Novels".into()
            })
        );

        fields.contents[0].quantity = 1;
        fields.room_of_origin = "  ".into();
        assert_eq!(
            validate_package_fields(&fields),
            Err(ValidationError::Required("roomOfOrigin"))
        );
    }

    #[test]
    fn move_fields_are_required() {
        let fields = NewMove {
            name: "Apartment Move".into(),
            departure_address: "".into(),
            arrival_address: "2 New Road".into(),
        };
        assert_eq!(
            validate_move_fields(&fields),
            Err(ValidationError::Required("departureAddress"))
        );
    }

    #[test]
    fn move_update_checks_present_fields_only() {
        assert_eq!(validate_move_update(&MoveUpdate::default()), Ok(()));
        let blank_name = MoveUpdate {
            name: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(
            validate_move_update(&blank_name),
            Err(ValidationError::Required("name"))
        );
        let new_arrival = MoveUpdate {
            arrival_address: Some("9 Hill Lane".into()),
            ..Default::default()
        };
        assert_eq!(validate_move_update(&new_arrival), Ok(()));
    }
}
