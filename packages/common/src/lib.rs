pub mod bill;
pub mod billing;
pub mod entry;
pub mod id;
pub mod image;
pub mod money;
pub mod storage;

pub use entry::{
    CompanyDetails, CompanyDetailsInput, EntryPatch, EntryStatus, NewRepairEntry, Part,
    RepairEntry, ValidationError,
};
pub use id::ObjectId;
pub use money::Money;
