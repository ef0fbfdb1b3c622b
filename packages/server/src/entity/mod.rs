pub mod company_details;
pub mod repair_entry;
