//! File system storage
//!
//! Tenant-confined path resolution, quota accounting, and the file
//! operations both front ends share.

pub mod operations;
pub mod quota;
pub mod resolve;

pub use operations::{EntryInfo, delete_entry, list_directory, read_file, write_file};
pub use quota::{check_write, disk_usage, parse_size_limit};
pub use resolve::{resolve, tenant_root};
