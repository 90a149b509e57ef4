/// Data layer: core types, format readers and loading.
///
/// Architecture:
/// ```text
///  .xpt   .sas7bdat   .csv / .xlsx
///    │        │            │
///    ▼        ▼            │
///  xport  sas7bdat         │      (+ decompress, sasdate)
///    │        │            │
///    └────────┴─────┬──────┘
///                   ▼
///             ┌──────────┐
///             │  loader   │  dispatch by extension → LoadedFile
///             └──────────┘
///                   │
///                   ▼
///          Table + NativeMetadata
/// ```

pub mod decompress;
pub mod error;
pub mod loader;
pub mod model;
pub mod sas7bdat;
pub mod sasdate;
pub mod xport;
