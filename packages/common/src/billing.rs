use serde::{Deserialize, Serialize};

use crate::entry::{
    EntryPatch, EntryStatus, Part, RepairEntry, ValidationError, validate_advance,
};
use crate::money::Money;

/// Amounts produced when an entry is delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryTotals {
    /// Sum of `quantity * price` over all parts.
    pub total_amount: Money,
    /// `total_amount - advance`. Negative when the advance exceeded the bill.
    pub final_amount: Money,
}

/// Compute bill totals from a parts list and the advance already collected.
pub fn compute_delivery(parts: &[Part], advance_cash: &str) -> Result<DeliveryTotals, ValidationError> {
    let advance = validate_advance(advance_cash)?;

    let mut total = Money::ZERO;
    for part in parts {
        if part.quantity == 0 {
            return Err(ValidationError::new("Part quantity must be at least 1"));
        }
        total = part
            .line_total()
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| ValidationError::new("Bill total is out of range"))?;
    }

    let final_amount = total
        .checked_sub(advance)
        .ok_or_else(|| ValidationError::new("Bill total is out of range"))?;

    Ok(DeliveryTotals {
        total_amount: total,
        final_amount,
    })
}

/// Payload for the pending -> delivered transition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequest {
    #[serde(default)]
    pub delivery_date: String,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

impl DeliveryRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.delivery_date.trim().is_empty() {
            return Err(ValidationError::new("Delivery date is required"));
        }
        for part in &self.parts {
            if part.description.trim().is_empty() || !part.price.is_positive() {
                return Err(ValidationError::new(
                    "Please fill in all part descriptions and prices",
                ));
            }
            if part.quantity == 0 {
                return Err(ValidationError::new("Part quantity must be at least 1"));
            }
        }
        Ok(())
    }
}

/// Build the single patch that delivers `entry`.
///
/// Nothing is written by this function; an error here means the entry stays
/// pending and unmodified.
pub fn delivery_patch(entry: &RepairEntry, request: &DeliveryRequest) -> Result<EntryPatch, ValidationError> {
    if entry.status == EntryStatus::Delivered {
        return Err(ValidationError::new("Entry has already been delivered"));
    }
    request.validate()?;

    let totals = compute_delivery(&request.parts, &entry.advancecash)?;

    Ok(EntryPatch {
        delivery_date: Some(request.delivery_date.clone()),
        parts: Some(request.parts.clone()),
        total_amount: Some(totals.total_amount.to_string()),
        final_amount: Some(totals.final_amount.to_string()),
        payment_method: request.payment_method.clone(),
        status: Some(EntryStatus::Delivered),
        ..Default::default()
    })
}
