//! Printable bill model for a delivered entry.
//!
//! Layout only goes as far as page breaks; turning a [`BillDocument`] into a
//! PDF is left to the client.

use serde::Serialize;

use crate::entry::{CompanyDetails, EntryStatus, Part, RepairEntry, ValidationError};
use crate::money::Money;

/// Part rows on the first page, below the header blocks.
pub const FIRST_PAGE_ROWS: usize = 5;
/// Part rows on every continuation page.
pub const CONTINUATION_PAGE_ROWS: usize = 20;

const NOT_AVAILABLE: &str = "N/A";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillContact {
    pub name: String,
    pub phone: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillHeader {
    pub company_name: String,
    pub address: String,
    pub owners: Vec<BillContact>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillCustomer {
    pub name: String,
    pub contact_number: String,
    pub address: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillVehicle {
    /// Block title, e.g. "Bike Information".
    pub heading: String,
    pub vehicle_type: String,
    pub model: String,
    pub number_plate: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillRow {
    pub description: String,
    pub quantity: u32,
    /// Unit price, two decimals.
    pub price: String,
    /// `quantity * price`, two decimals.
    pub amount: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillPage {
    /// 1-based.
    pub number: usize,
    /// Set on every page after the first ("Parts Details (Continued)").
    pub continued: bool,
    pub rows: Vec<BillRow>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillSummary {
    pub parts_subtotal: String,
    pub total_amount: String,
    pub advance_cash: String,
    pub final_amount: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillDocument {
    pub entry_id: String,
    pub header: BillHeader,
    pub customer: BillCustomer,
    pub vehicle: BillVehicle,
    pub repair_type: String,
    pub entry_date: String,
    pub delivery_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub pages: Vec<BillPage>,
    pub summary: BillSummary,
}

impl BillDocument {
    pub fn build(entry: &RepairEntry, company: &CompanyDetails) -> Result<Self, ValidationError> {
        if entry.status != EntryStatus::Delivered {
            return Err(ValidationError::new(
                "A bill is only available once the entry is delivered",
            ));
        }

        let mut subtotal = Money::ZERO;
        let mut rows = Vec::with_capacity(entry.parts.len());
        for part in &entry.parts {
            let amount = line_amount(part)?;
            subtotal = subtotal
                .checked_add(amount)
                .ok_or_else(|| ValidationError::new("Bill total is out of range"))?;
            rows.push(BillRow {
                description: part.description.clone(),
                quantity: part.quantity,
                price: part.price.to_string(),
                amount: amount.to_string(),
            });
        }

        let summary = BillSummary {
            parts_subtotal: subtotal.to_string(),
            total_amount: stored_amount(&entry.total_amount, "Total amount")?.to_string(),
            advance_cash: stored_amount(&entry.advancecash, "Advance cash")?.to_string(),
            final_amount: stored_amount(
                entry.final_amount.as_deref().unwrap_or_default(),
                "Final amount",
            )?
            .to_string(),
        };

        let mut owners = vec![BillContact {
            name: company.owner1_name.clone(),
            phone: company.owner1_phone.clone(),
        }];
        if let (Some(name), Some(phone)) = (&company.owner2_name, &company.owner2_phone) {
            owners.push(BillContact {
                name: name.clone(),
                phone: phone.clone(),
            });
        }

        Ok(Self {
            entry_id: entry.id.clone(),
            header: BillHeader {
                company_name: company.company_name.clone(),
                address: company.address.clone(),
                owners,
            },
            customer: BillCustomer {
                name: entry.customer_name.clone(),
                contact_number: entry.contact_number.clone(),
                address: entry.address.clone(),
            },
            vehicle: BillVehicle {
                heading: vehicle_heading(&company.vehicle_type),
                vehicle_type: entry.bike_type.clone(),
                model: or_not_available(&entry.bike_model),
                number_plate: or_not_available(&entry.number_plate),
            },
            repair_type: entry.repair_type.clone(),
            entry_date: entry.entry_date.clone(),
            delivery_date: entry.delivery_date.clone().unwrap_or_default(),
            payment_method: entry.payment_method.clone(),
            pages: paginate(rows),
            summary,
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Split rows into pages. There is always at least one page.
pub fn paginate(rows: Vec<BillRow>) -> Vec<BillPage> {
    let mut pages = Vec::new();
    let mut iter = rows.into_iter().peekable();

    let first: Vec<_> = iter.by_ref().take(FIRST_PAGE_ROWS).collect();
    pages.push(BillPage {
        number: 1,
        continued: false,
        rows: first,
    });

    while iter.peek().is_some() {
        let rows: Vec<_> = iter.by_ref().take(CONTINUATION_PAGE_ROWS).collect();
        pages.push(BillPage {
            number: pages.len() + 1,
            continued: true,
            rows,
        });
    }
    pages
}

/// "bike" -> "Bike Information".
fn vehicle_heading(vehicle_type: &str) -> String {
    let mut chars = vehicle_type.trim().chars();
    match chars.next() {
        Some(first) => format!("{}{} Information", first.to_uppercase(), chars.as_str()),
        None => "Vehicle Information".to_string(),
    }
}

fn or_not_available(value: &str) -> String {
    if value.trim().is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}

fn line_amount(part: &Part) -> Result<Money, ValidationError> {
    part.line_total()
        .ok_or_else(|| ValidationError::new("Bill total is out of range"))
}

fn stored_amount(value: &str, label: &str) -> Result<Money, ValidationError> {
    Money::parse(value).map_err(|_| ValidationError::new(format!("{label} is not a valid amount")))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::billing::{DeliveryRequest, delivery_patch};
    use crate::entry::NewRepairEntry;

    fn company() -> CompanyDetails {
        CompanyDetails {
            user_id: "user_1".into(),
            company_name: "Royal Garage".into(),
            address: "12 Market Road".into(),
            owner1_name: "Ravi".into(),
            owner1_phone: "9000000001".into(),
            owner2_name: None,
            owner2_phone: None,
            vehicle_type: "bike".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn delivered_entry(part_count: usize) -> RepairEntry {
        let mut entry = NewRepairEntry {
            user_id: "user_1".into(),
            customer_name: "Asha".into(),
            contact_number: "9876543210".into(),
            bike_type: "Classic 350".into(),
            entry_date: "2024-05-01".into(),
            advancecash: "100".into(),
            ..Default::default()
        }
        .into_entry("e1".into(), Utc::now());

        let request = DeliveryRequest {
            delivery_date: "2024-05-03".into(),
            parts: (0..part_count)
                .map(|i| Part {
                    description: format!("Part {i}"),
                    quantity: 1,
                    price: Money::from_minor(10_000),
                })
                .collect(),
            payment_method: Some("cash".into()),
        };
        let patch = delivery_patch(&entry, &request).unwrap();
        patch.apply(&mut entry, Utc::now()).unwrap();
        entry
    }

    #[test]
    fn pending_entry_has_no_bill() {
        let entry = NewRepairEntry {
            user_id: "user_1".into(),
            ..Default::default()
        }
        .into_entry("e1".into(), Utc::now());
        assert!(BillDocument::build(&entry, &company()).is_err());
    }

    #[test]
    fn first_page_holds_five_rows() {
        let bill = BillDocument::build(&delivered_entry(5), &company()).unwrap();
        assert_eq!(bill.page_count(), 1);
        assert_eq!(bill.pages[0].rows.len(), 5);
    }

    #[test]
    fn overflow_rows_go_to_continuation_pages() {
        let bill = BillDocument::build(&delivered_entry(26), &company()).unwrap();
        let sizes: Vec<usize> = bill.pages.iter().map(|p| p.rows.len()).collect();
        assert_eq!(sizes, vec![5, 20, 1]);
        assert!(!bill.pages[0].continued);
        assert!(bill.pages[1].continued);
        assert_eq!(bill.pages[2].number, 3);
    }

    #[test]
    fn no_parts_still_yields_one_page() {
        let bill = BillDocument::build(&delivered_entry(0), &company()).unwrap();
        assert_eq!(bill.page_count(), 1);
        assert!(bill.pages[0].rows.is_empty());
        assert_eq!(bill.summary.final_amount, "-100.00");
    }

    #[test]
    fn summary_and_labels() {
        let bill = BillDocument::build(&delivered_entry(3), &company()).unwrap();
        assert_eq!(bill.summary.parts_subtotal, "300.00");
        assert_eq!(bill.summary.total_amount, "300.00");
        assert_eq!(bill.summary.advance_cash, "100.00");
        assert_eq!(bill.summary.final_amount, "200.00");
        assert_eq!(bill.vehicle.heading, "Bike Information");
        assert_eq!(bill.vehicle.model, "N/A");
        assert_eq!(bill.header.owners.len(), 1);
        assert_eq!(bill.delivery_date, "2024-05-03");
    }

    #[test]
    fn heading_falls_back_without_vehicle_type() {
        assert_eq!(vehicle_heading(""), "Vehicle Information");
        assert_eq!(vehicle_heading("car"), "Car Information");
    }
}
