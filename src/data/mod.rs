/// Data layer: table model, loading, derivation, filtering and exports.
///
/// Architecture:
/// ```text
///  .xlsx / .csv / .json / .parquet  (path or URL)
///        │
///        ▼
///   ┌──────────┐     ┌─────────┐
///   │  loader   │ ──▶ │ columns │  alias → canonical names
///   └──────────┘     └─────────┘
///        │
///        ▼
///   ┌──────────┐
///   │   age     │  raw ages × unit factor → Age at Baseline
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  FilterSpec → derived Table (source untouched)
///   └──────────┘
///        │
///        ├──▶ summary   (chart inputs)
///        ├──▶ manifest  (pathology join)
///        └──▶ export    (csv / xlsx / .tcia)
/// ```

pub mod age;
pub mod cache;
pub mod columns;
pub mod export;
pub mod filter;
pub mod loader;
pub mod manifest;
pub mod model;
pub mod summary;
