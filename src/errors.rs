use thiserror::Error;

/// Failures surfaced by the move and package stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },

    /// A package operation named a move other than the store's bound scope.
    #[error("package store is bound to move `{bound}`, not `{requested}`")]
    ScopeMismatch { bound: String, requested: String },

    #[error("slot `{key}` holds malformed data: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    pub fn move_not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: "move",
            id: id.into(),
        }
    }

    pub fn package_not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: "package",
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Form-level validation failures. The stores never produce these.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("`{0}` is required")]
    Required(&'static str),

    #[error("dimension `{field}` must be greater than zero (got {value})")]
    NonPositiveDimension { field: &'static str, value: f64 },

    #[error("item `{name}` must have a quantity of at least 1")]
    InvalidQuantity { name: String },

    #[error("photo is not an image data URL")]
    InvalidPhotoType,

    #[error("photo payload is not valid base64")]
    InvalidPhotoEncoding,

    #[error("photo is too large ({size} bytes, max {max})")]
    PhotoTooLarge { size: usize, max: usize },
}
