mod cache;
mod codes;
mod config;
mod error;
mod events;
mod ledger;
mod lock;
mod order;
mod payment;
mod reconcile;
mod store;

pub use cache::{CacheStats, Cacheable, CachedStore};
pub use codes::{generate_order_number, generate_reference_code};
pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult, RecordKind};
pub use events::{LedgerEvent, LedgerEvents};
pub use ledger::{Ledger, ReconciliationIssue};
pub use lock::{LockError, RecordGuard, RecordLocks};
pub use order::{
    calculate_order_total, NewOrder, Order, OrderFilter, OrderItem, OrderStatus, OrderStore,
};
pub use payment::{NewPayment, Payment, PaymentStatus, PaymentStore, RevenueSummary};
pub use reconcile::{Reconciler, Reconciliation};
pub use store::{
    DocumentPredicate, DocumentStore, Documents, DocumentsExt, InMemoryDocumentStore, Model,
    StoreError,
};
