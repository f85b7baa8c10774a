use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Voting rights for an event, granted by claiming a purchased ticket.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ticket_vote_code")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "event_user")]
    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: HasOne<super::event::Entity>,

    #[sea_orm(unique_key = "event_user")]
    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    /// A ticket can be claimed exactly once.
    #[sea_orm(unique)]
    pub ticket_id: i32,
    #[sea_orm(belongs_to, from = "ticket_id", to = "id")]
    pub ticket: HasOne<super::transaction_item::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
