use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "company_details")]
pub struct Model {
    /// One profile per owning identity.
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    pub company_name: String,
    pub address: String,
    pub owner1_name: String,
    pub owner1_phone: String,
    pub owner2_name: Option<String>,
    pub owner2_phone: Option<String>,
    pub vehicle_type: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
