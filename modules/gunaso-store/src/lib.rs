pub mod postgres;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use postgres::{PgScratchStore, PgStore};
pub use traits::{
    ComplaintStore, ImageStore, RatingWrite, ScratchStore, StatusChange, SupportInsert, WardStore,
    Withdrawal,
};
