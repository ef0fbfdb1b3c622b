use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ObjectId;
use common::entry::{CompanyDetails, EntryPatch, NewRepairEntry, RepairEntry};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tokio::sync::broadcast;

use super::{ChangeKind, EntryChange, RecordError, RecordStore};
use crate::config::StorageBackend;
use crate::database::init_db;
use crate::entity::{company_details, repair_entry};

const CHANGE_FEED_CAPACITY: usize = 256;

/// Cloud document database backend over a SQL connection.
///
/// Writes made through this store are pushed to subscribers via
/// [`RecordStore::change_feed`].
pub struct SqlRecordStore {
    db: DatabaseConnection,
    changes: broadcast::Sender<EntryChange>,
}

impl SqlRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { db, changes }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(url: &str) -> Result<Self, RecordError> {
        let db = init_db(url).await?;
        Ok(Self::new(db))
    }

    fn notify(&self, user_id: &str, entry_id: &str, kind: ChangeKind) {
        // No receivers is fine.
        let _ = self.changes.send(EntryChange {
            user_id: user_id.to_string(),
            entry_id: entry_id.to_string(),
            kind,
        });
    }
}

fn to_entry(model: repair_entry::Model) -> Result<RepairEntry, RecordError> {
    let parts = if model.parts.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&model.parts)?
    };
    Ok(RepairEntry {
        id: model.id,
        user_id: model.user_id,
        customer_name: model.customer_name,
        contact_number: model.contact_number,
        address: model.address,
        vehicle_category: model.vehicle_category,
        bike_type: model.bike_type,
        bike_model: model.bike_model,
        number_plate: model.number_plate,
        repair_type: model.repair_type,
        entry_date: model.entry_date,
        expected_delivery_date: model.expected_delivery_date,
        delivery_date: model.delivery_date,
        advancecash: model.advancecash,
        total_amount: model.total_amount,
        final_amount: model.final_amount,
        parts,
        image_url: model.image_url,
        payment_method: model.payment_method,
        status: model.status,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn to_active(entry: &RepairEntry) -> Result<repair_entry::ActiveModel, RecordError> {
    Ok(repair_entry::ActiveModel {
        id: Set(entry.id.clone()),
        user_id: Set(entry.user_id.clone()),
        customer_name: Set(entry.customer_name.clone()),
        contact_number: Set(entry.contact_number.clone()),
        address: Set(entry.address.clone()),
        vehicle_category: Set(entry.vehicle_category.clone()),
        bike_type: Set(entry.bike_type.clone()),
        bike_model: Set(entry.bike_model.clone()),
        number_plate: Set(entry.number_plate.clone()),
        repair_type: Set(entry.repair_type.clone()),
        entry_date: Set(entry.entry_date.clone()),
        expected_delivery_date: Set(entry.expected_delivery_date.clone()),
        delivery_date: Set(entry.delivery_date.clone()),
        advancecash: Set(entry.advancecash.clone()),
        total_amount: Set(entry.total_amount.clone()),
        final_amount: Set(entry.final_amount.clone()),
        parts: Set(serde_json::to_string(&entry.parts)?),
        image_url: Set(entry.image_url.clone()),
        payment_method: Set(entry.payment_method.clone()),
        status: Set(entry.status),
        created_at: Set(entry.created_at),
        updated_at: Set(entry.updated_at),
    })
}

fn to_company(model: company_details::Model) -> CompanyDetails {
    CompanyDetails {
        user_id: model.user_id,
        company_name: model.company_name,
        address: model.address,
        owner1_name: model.owner1_name,
        owner1_phone: model.owner1_phone,
        owner2_name: model.owner2_name,
        owner2_phone: model.owner2_phone,
        vehicle_type: model.vehicle_type,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

#[async_trait]
impl RecordStore for SqlRecordStore {
    fn kind(&self) -> StorageBackend {
        StorageBackend::Cloud
    }

    async fn create(
        &self,
        entry: &NewRepairEntry,
        created_at: DateTime<Utc>,
    ) -> Result<String, RecordError> {
        let id = ObjectId::generate().to_hex();
        let entry = entry.clone().into_entry(id.clone(), created_at);

        repair_entry::Entity::insert(to_active(&entry)?)
            .exec_without_returning(&self.db)
            .await?;

        self.notify(&entry.user_id, &id, ChangeKind::Created);
        Ok(id)
    }

    async fn get(
        &self,
        id: &str,
        _user_hint: Option<&str>,
    ) -> Result<Option<RepairEntry>, RecordError> {
        repair_entry::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(to_entry)
            .transpose()
    }

    async fn list(&self, user_id: &str) -> Result<Vec<RepairEntry>, RecordError> {
        repair_entry::Entity::find()
            .filter(repair_entry::Column::UserId.eq(user_id))
            .order_by_desc(repair_entry::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_entry)
            .collect()
    }

    async fn list_all(&self) -> Result<Vec<RepairEntry>, RecordError> {
        repair_entry::Entity::find()
            .order_by_desc(repair_entry::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_entry)
            .collect()
    }

    async fn update(
        &self,
        id: &str,
        patch: &EntryPatch,
        _user_hint: Option<&str>,
    ) -> Result<RepairEntry, RecordError> {
        let model = repair_entry::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| RecordError::NotFound(format!("Entry {id}")))?;

        let mut entry = to_entry(model)?;
        patch.apply(&mut entry, Utc::now())?;
        to_active(&entry)?.update(&self.db).await?;

        self.notify(&entry.user_id, id, ChangeKind::Updated);
        Ok(entry)
    }

    async fn delete(&self, id: &str, _user_hint: Option<&str>) -> Result<bool, RecordError> {
        let Some(model) = repair_entry::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
        else {
            return Ok(false);
        };

        let result = repair_entry::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Ok(false);
        }

        self.notify(&model.user_id, id, ChangeKind::Deleted);
        Ok(true)
    }

    async fn get_company(&self, user_id: &str) -> Result<Option<CompanyDetails>, RecordError> {
        Ok(company_details::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?
            .map(to_company))
    }

    async fn save_company(&self, details: &CompanyDetails) -> Result<(), RecordError> {
        let model = company_details::ActiveModel {
            user_id: Set(details.user_id.clone()),
            company_name: Set(details.company_name.clone()),
            address: Set(details.address.clone()),
            owner1_name: Set(details.owner1_name.clone()),
            owner1_phone: Set(details.owner1_phone.clone()),
            owner2_name: Set(details.owner2_name.clone()),
            owner2_phone: Set(details.owner2_phone.clone()),
            vehicle_type: Set(details.vehicle_type.clone()),
            created_at: Set(details.created_at),
            updated_at: Set(details.updated_at),
        };

        company_details::Entity::insert(model)
            .on_conflict(
                OnConflict::column(company_details::Column::UserId)
                    .update_columns([
                        company_details::Column::CompanyName,
                        company_details::Column::Address,
                        company_details::Column::Owner1Name,
                        company_details::Column::Owner1Phone,
                        company_details::Column::Owner2Name,
                        company_details::Column::Owner2Phone,
                        company_details::Column::VehicleType,
                        company_details::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    fn change_feed(&self) -> Option<broadcast::Receiver<EntryChange>> {
        Some(self.changes.subscribe())
    }
}
