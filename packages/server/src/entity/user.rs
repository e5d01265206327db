use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account record owned by the identity service; read-only here.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    /// `admin` or `user`.
    pub role: String,

    #[sea_orm(has_many)]
    pub notes: HasMany<super::note::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
