//! Edition entity
//!
//! One row per calendar send. AI-generated prose lands on this row as it
//! is produced; `worth_watching` is the four-section JSON blob. Status
//! moves draft -> sending -> sent and never back.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "editions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub edition_date: Date,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub hero_article_id: Option<Uuid>,

    #[sea_orm(column_type = "Text", nullable)]
    pub editor_note: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub worth_watching: Option<Json>,

    #[sea_orm(column_type = "Text", nullable)]
    pub subject_a: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub subject_b: Option<String>,

    /// Which subject variant the remainder cohort receives ('a' or 'b')
    #[sea_orm(column_type = "Text", nullable)]
    pub subject_winner: Option<String>,

    pub mystery_link_id: Option<Uuid>,

    pub fun_fact_id: Option<Uuid>,

    pub sponsor_id: Option<Uuid>,

    pub sent_count: i32,

    pub failed_count: i32,

    pub sent_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::story::Entity")]
    Stories,

    #[sea_orm(has_many = "super::send::Entity")]
    Sends,
}

impl Related<super::story::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stories.def()
    }
}

impl Related<super::send::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sends.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
