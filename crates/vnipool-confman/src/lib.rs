//! VNI Pool Config Manager
//!
//! Allocates per-tenant network segment IDs (VLAN tags, VXLAN VNIs) from
//! administrator-defined ranges. Allocation state lives as a base64 bitmap
//! inside the shared TenantConfig record, one bitmap per interface profile.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           VNI ALLOCATOR                             │
//! │                                                                     │
//! │   reserve / free ──► profile lookup (name + vniType, exact)         │
//! │        │                                                            │
//! │        ├──► VniRange     "100-200,305" → 100, 101, ... 305          │
//! │        ├──► BitArray     base64 ⇄ bits, first clear bit wins        │
//! │        ▼                                                            │
//! │   conditional update (resourceVersion) ──► TenantConfigStore        │
//! │        │                                                            │
//! │        └── conflict ⇒ PersistenceFailed, caller re-fetches          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine never retries on its own. [`VniAllocator::allocate`] and
//! [`VniAllocator::release`] are the caller-side wrappers that re-fetch and
//! retry lost races according to [`RetrySettings`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod engine;
pub mod error;
pub mod model;
pub mod range;
pub mod settings;
pub mod store;
pub mod telemetry;

pub use audit::{audit, Inconsistency, InconsistencyKind};
pub use engine::{Release, ReleaseOutcome, Reservation, VniAllocator};
pub use error::{ConfmanError, ConfmanResult};
pub use model::{IfaceProfile, NetworkOptions, NetworkSegment, ObjectMeta, ProfileKey, TenantConfig, VniType};
pub use range::{RangeError, VniRange};
pub use settings::{ConfmanSettings, RetrySettings};
pub use store::{fetch_tenant_config, InMemoryTenantConfigStore, StoreError, StoreResult, TenantConfigStore};
pub use telemetry::init_tracing;
pub use vnipool_bitarray::{BitArray, BitArrayError};
