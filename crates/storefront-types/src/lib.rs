//! storefront-types: domain records and repository ports shared by every adapter.

pub mod domain;
pub mod ports;
