//! Coldsig library.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub use coldsig_ceremony as ceremony;
pub use coldsig_device as device;
