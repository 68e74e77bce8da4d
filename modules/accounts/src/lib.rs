//! User accounts: registration, logon and logoff.

pub mod api;
pub mod contract;
pub mod domain;
pub mod infra;
