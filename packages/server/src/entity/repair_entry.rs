use common::EntryStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repair_entry")]
pub struct Model {
    /// 24-char hex object id.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub user_id: String,
    pub customer_name: String,
    pub contact_number: String,
    pub address: String,
    pub vehicle_category: String,
    pub bike_type: String,
    pub bike_model: String,
    pub number_plate: String,
    pub repair_type: String,
    pub entry_date: String,
    pub expected_delivery_date: String,
    pub delivery_date: Option<String>,
    pub advancecash: String,
    pub total_amount: String,
    pub final_amount: Option<String>,

    /// Parts list as a JSON array of `{description, quantity, price}`.
    #[sea_orm(column_type = "Text")]
    pub parts: String,

    pub image_url: Option<String>,
    pub payment_method: Option<String>,
    pub status: EntryStatus,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
