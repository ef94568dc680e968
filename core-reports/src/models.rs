//! Report entity.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::Path;

/// Form fields of an off-site task report, as entered by the officer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFields {
    pub destination: String,
    pub description: String,
    pub address: String,
    pub latitude: String,
    pub longitude: String,
}

impl ReportFields {
    pub fn new(
        destination: impl Into<String>,
        description: impl Into<String>,
        address: impl Into<String>,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            description: description.into(),
            address: address.into(),
            latitude: latitude.into(),
            longitude: longitude.into(),
        }
    }
}

/// A report waiting in the local queue.
///
/// `local_id` is [`Report::UNSAVED_ID`] until the store assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Report {
    pub local_id: i64,
    pub destination: String,
    pub description: String,
    pub address: String,
    pub latitude: String,
    pub longitude: String,
    pub image_path: String,
    /// Unix millis
    pub created_at: i64,
}

impl Report {
    pub const UNSAVED_ID: i64 = 0;

    pub fn new(fields: ReportFields, image_path: impl Into<String>, created_at: i64) -> Self {
        Self {
            local_id: Self::UNSAVED_ID,
            destination: fields.destination,
            description: fields.description,
            address: fields.address,
            latitude: fields.latitude,
            longitude: fields.longitude,
            image_path: image_path.into(),
            created_at,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.local_id != Self::UNSAVED_ID
    }

    pub fn fields(&self) -> ReportFields {
        ReportFields {
            destination: self.destination.clone(),
            description: self.description.clone(),
            address: self.address.clone(),
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
        }
    }

    pub fn image_path(&self) -> &Path {
        Path::new(&self.image_path)
    }
}
