//! Subscriber entity
//!
//! Lifecycle is independent from editions: pending until confirmed,
//! excluded from sends once unsubscribed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscribers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    pub confirmed: bool,

    #[sea_orm(column_type = "Text")]
    pub confirmation_token: String,

    #[sea_orm(column_type = "Text")]
    pub unsubscribe_token: String,

    pub unsubscribed: bool,

    pub confirmed_at: Option<DateTimeWithTimeZone>,

    pub unsubscribed_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::send::Entity")]
    Sends,
}

impl Related<super::send::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sends.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
