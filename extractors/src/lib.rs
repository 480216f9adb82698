//! Extractors Crate
//!
//! Pure normalization layer for rows pulled from the external ledger. The
//! ledger returns loosely-structured cell values (plain scalars, `{value:
//! [{text}]}` wrappers, arrays, tagged objects); this crate flattens them,
//! resolves free-form month text, collapses upstream duplicates and
//! aggregates rows into per-employee-per-month totals.
//!
//! # Architecture
//!
//! - **Types**: shared data shapes live in the `shared-types` crate
//! - **Implementations**: extraction and aggregation live here; no I/O
//!
//! # Modules
//!
//! - `field_value`: heterogeneous cell shape -> plain string / number
//! - `month`: free-form month text -> `MonthKey`
//! - `aggregate`: dedupe + per-employee-per-month aggregation

pub mod aggregate;
pub mod field_value;
pub mod month;

// Re-export commonly used entry points
pub use aggregate::{aggregate_items, dedupe_items, resolve_month_key};
pub use field_value::{extract_number, extract_string};
pub use month::{parse_month, MonthKey};
