use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One user's complete ballot for one compo.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote_group")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "user_compo")]
    pub user_id: i32,
    #[sea_orm(belongs_to, from = "user_id", to = "id")]
    pub user: HasOne<super::user::Entity>,

    #[sea_orm(unique_key = "user_compo")]
    pub compo_id: i32,
    #[sea_orm(belongs_to, from = "compo_id", to = "id")]
    pub compo: HasOne<super::compo::Entity>,

    #[sea_orm(has_many)]
    pub votes: HasMany<super::vote::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
