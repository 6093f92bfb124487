//! I/O for registered scans
//!
//! Scans are exported as plain text, one point per line:
//!
//! ```text
//! v 0.1000 2.0000 -0.5000 vn 0.000000 0.000000 1.000000
//! ```
//!
//! Positions carry four decimals and normals six. Several scans written to the
//! same file are simply concatenated.

pub mod error;
pub mod scan_points;

pub use error::*;
pub use scan_points::{ScanPointReader, ScanPointWriter};
