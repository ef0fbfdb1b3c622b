#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A missing or malformed field, reported to the caller before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Lifecycle of a repair entry. The only transition is `Pending -> Delivered`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "delivered"))]
    Delivered,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
        }
    }
}

/// One billed line item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Part {
    pub description: String,
    #[schema(example = 2)]
    pub quantity: u32,
    #[schema(value_type = f64, example = 150)]
    pub price: Money,
}

impl Part {
    /// `quantity * price`, or `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_mul(self.quantity)
    }
}

/// One customer vehicle service job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepairEntry {
    pub id: String,
    pub user_id: String,
    pub customer_name: String,
    pub contact_number: String,
    pub address: String,
    #[serde(default)]
    pub vehicle_category: String,
    pub bike_type: String,
    pub bike_model: String,
    pub number_plate: String,
    pub repair_type: String,
    pub entry_date: String,
    #[serde(default)]
    pub expected_delivery_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
    pub advancecash: String,
    pub total_amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_amount: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RepairEntry {
    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Sort newest first, the natural order within a single backend.
pub fn sort_newest_first(entries: &mut [RepairEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn default_advance() -> String {
    "0".into()
}

/// Fields supplied when registering a new entry.
///
/// Status, parts and totals are not accepted here: every entry starts pending
/// with an empty parts list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewRepairEntry {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub contact_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub vehicle_category: String,
    #[serde(default)]
    pub bike_type: String,
    #[serde(default)]
    pub bike_model: String,
    #[serde(default)]
    pub number_plate: String,
    #[serde(default)]
    pub repair_type: String,
    #[serde(default)]
    pub entry_date: String,
    #[serde(default)]
    pub expected_delivery_date: String,
    #[serde(default = "default_advance")]
    pub advancecash: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

impl NewRepairEntry {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::new("User ID required"));
        }
        validate_contact_number(&self.contact_number)?;
        validate_advance(&self.advancecash)?;
        Ok(())
    }

    /// Materialise the record a backend stores under `id`.
    pub fn into_entry(self, id: String, created_at: DateTime<Utc>) -> RepairEntry {
        let advancecash = if self.advancecash.trim().is_empty() {
            default_advance()
        } else {
            self.advancecash
        };
        RepairEntry {
            id,
            user_id: self.user_id,
            customer_name: self.customer_name,
            contact_number: self.contact_number,
            address: self.address,
            vehicle_category: self.vehicle_category,
            bike_type: self.bike_type,
            bike_model: self.bike_model,
            number_plate: self.number_plate,
            repair_type: self.repair_type,
            entry_date: self.entry_date,
            expected_delivery_date: self.expected_delivery_date,
            delivery_date: None,
            advancecash,
            total_amount: "0".into(),
            final_amount: None,
            parts: Vec::new(),
            image_url: self.image_url.filter(|u| !u.is_empty()),
            payment_method: self.payment_method,
            status: EntryStatus::Pending,
            created_at,
            updated_at: created_at,
        }
    }
}

/// Partial update. Absent fields are left untouched.
///
/// Carries no `id`, `userId` or `createdAt`; those keys are dropped when a
/// request body is deserialized into a patch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bike_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bike_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_delivery_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advancecash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<Part>>,
    /// An empty string clears the reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
}

impl EntryPatch {
    /// Patch that drops an entry's image reference.
    pub fn clear_image() -> Self {
        Self {
            image_url: Some(String::new()),
            ..Default::default()
        }
    }

    /// Field-level checks that do not depend on the stored record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(contact) = &self.contact_number {
            validate_contact_number(contact)?;
        }
        if let Some(advance) = &self.advancecash {
            validate_advance(advance)?;
        }
        if let Some(parts) = &self.parts
            && parts.iter().any(|p| p.quantity == 0 || p.price.is_negative())
        {
            return Err(ValidationError::new(
                "Part quantity must be at least 1 and price must not be negative",
            ));
        }
        Ok(())
    }

    /// Apply onto a stored record, refusing to move a delivered entry back to pending.
    pub fn apply(&self, entry: &mut RepairEntry, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if entry.status == EntryStatus::Delivered && self.status == Some(EntryStatus::Pending) {
            return Err(ValidationError::new(
                "A delivered entry cannot be moved back to pending",
            ));
        }

        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }

        set(&mut entry.customer_name, &self.customer_name);
        set(&mut entry.contact_number, &self.contact_number);
        set(&mut entry.address, &self.address);
        set(&mut entry.vehicle_category, &self.vehicle_category);
        set(&mut entry.bike_type, &self.bike_type);
        set(&mut entry.bike_model, &self.bike_model);
        set(&mut entry.number_plate, &self.number_plate);
        set(&mut entry.repair_type, &self.repair_type);
        set(&mut entry.entry_date, &self.entry_date);
        set(&mut entry.expected_delivery_date, &self.expected_delivery_date);
        set(&mut entry.advancecash, &self.advancecash);
        set(&mut entry.total_amount, &self.total_amount);
        set(&mut entry.parts, &self.parts);
        set(&mut entry.status, &self.status);

        if let Some(date) = &self.delivery_date {
            entry.delivery_date = Some(date.clone());
        }
        if let Some(amount) = &self.final_amount {
            entry.final_amount = Some(amount.clone());
        }
        if let Some(method) = &self.payment_method {
            entry.payment_method = Some(method.clone());
        }
        if let Some(url) = &self.image_url {
            entry.image_url = (!url.is_empty()).then(|| url.clone());
        }

        entry.updated_at = now;
        Ok(())
    }
}

/// Digits only, at most ten characters. Empty is allowed.
pub fn validate_contact_number(contact: &str) -> Result<(), ValidationError> {
    if contact.len() > 10 || !contact.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::new(
            "Contact number must contain only digits (max 10)",
        ));
    }
    Ok(())
}

/// A non-negative decimal amount.
pub fn validate_advance(advance: &str) -> Result<Money, ValidationError> {
    let amount = Money::parse(advance)
        .map_err(|_| ValidationError::new("Advance cash must be a valid amount"))?;
    if amount.is_negative() {
        return Err(ValidationError::new("Advance cash cannot be negative"));
    }
    Ok(amount)
}

/// Shop profile, one per owning identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetails {
    pub user_id: String,
    pub company_name: String,
    pub address: String,
    pub owner1_name: String,
    pub owner1_phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner2_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner2_phone: Option<String>,
    /// Used to label vehicle fields ("bike", "car", ...).
    pub vehicle_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetailsInput {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub owner1_name: String,
    #[serde(default)]
    pub owner1_phone: String,
    #[serde(default)]
    pub owner2_name: Option<String>,
    #[serde(default)]
    pub owner2_phone: Option<String>,
    #[serde(default)]
    pub vehicle_type: String,
}

impl CompanyDetailsInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::new("User ID required"));
        }
        let required = [
            (&self.company_name, "Company name"),
            (&self.address, "Address"),
            (&self.owner1_name, "Owner name"),
            (&self.owner1_phone, "Owner phone"),
            (&self.vehicle_type, "Vehicle type"),
        ];
        for (value, label) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::new(format!("{label} is required")));
            }
        }
        Ok(())
    }

    /// Build the stored profile, keeping `created_at` from an earlier version.
    pub fn into_details(
        self,
        existing: Option<&CompanyDetails>,
        now: DateTime<Utc>,
    ) -> CompanyDetails {
        let blank_to_none = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        CompanyDetails {
            user_id: self.user_id,
            company_name: self.company_name,
            address: self.address,
            owner1_name: self.owner1_name,
            owner1_phone: self.owner1_phone,
            owner2_name: blank_to_none(self.owner2_name),
            owner2_phone: blank_to_none(self.owner2_phone),
            vehicle_type: self.vehicle_type,
            created_at: existing.map(|d| d.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}
