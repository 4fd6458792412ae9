//! Data layer: record model, loading, indexing and filtering.
//!
//! Architecture:
//! ```text
//!  .json / .csv / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → raw records
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────────┐
//!   │ DatasetIndex  │  coerce timestamps, build standard dimensions
//!   └──────────────┘
//!        │
//!        ▼
//!   ┌──────────┐      ┌──────────┐
//!   │ Dataset   │ ───▶ │  groups   │  filter change → add/remove per group
//!   └──────────┘      └──────────┘
//! ```

pub mod dataset;
pub mod dimension;
pub mod filter;
pub mod index;
pub mod loader;
pub mod model;
