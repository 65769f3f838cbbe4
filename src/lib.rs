//! Blood bank inventory and request reconciliation.
//!
//! Donations are held as individual units that expire 42 days after
//! collection. Requests for a blood type are served in full from the oldest
//! usable units, or not at all.
//!
//! ```
//! use bloodbank::{InventoryStore, ReconciliationEngine, RequestLedger, RequestStatus};
//! use chrono::NaiveDate;
//!
//! let inventory = InventoryStore::default();
//! let ledger = RequestLedger::default();
//! let engine = ReconciliationEngine::new(&inventory, &ledger);
//!
//! let day = |s: &str| s.parse::<NaiveDate>().unwrap();
//! engine.add_unit("A+", 10, day("2024-01-15"), None)?;
//! let request = engine.add_request("St Mary's", "A+", 2, day("2024-02-01"))?;
//!
//! engine.fulfill_request(request, day("2024-02-01"))?;
//! assert_eq!(engine.total_available("A+", day("2024-02-01"))?, 8);
//! assert_eq!(ledger.find(request).unwrap().status(), RequestStatus::Fulfilled);
//! # Ok::<(), bloodbank::Error>(())
//! ```

pub mod domain;
pub use domain::{
    BloodRequest, BloodType, BloodUnit, Config, DateFormat, Error, ExpiryPolicy, Fulfilment,
    InventoryStore, Quantity, ReconciliationEngine, RequestId, RequestLedger, RequestStatus,
    Result, Role, UnitId, User, UserId, Users,
};

/// Filesystem storage for a blood bank directory.
pub mod storage;
pub use storage::Directory;
