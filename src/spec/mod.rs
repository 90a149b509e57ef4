/// Specification side: find a table that documents the loaded dataset and
/// describe its columns.
///
/// ```text
///  directory listing
///        │  .csv / .xlsx
///        ▼
///     catalog ──(legacy $-format)── legacy
///        │
///        ▼
///     matcher  ◄── dataset file name + columns
///        │  SpecMatch
///        ▼
///     describe ◄── NativeMetadata
///        │
///        ▼
///   MetadataRow per column
/// ```

pub mod catalog;
pub mod describe;
pub mod legacy;
pub mod matcher;
