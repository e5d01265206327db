use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Metadata for one uploaded study document.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "note")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub title: String,
    pub subject: String,
    /// 1 through 8.
    pub semester: i32,
    pub unit: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Generated blob name in the upload directory.
    pub filename: String,
    pub file_path: String,
    pub file_size: Option<i64>,

    pub uploaded_by: i32,
    #[sea_orm(belongs_to, from = "uploaded_by", to = "id")]
    pub uploader: HasOne<super::user::Entity>,

    #[sea_orm(default_value = 0)]
    pub downloads: i64,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
