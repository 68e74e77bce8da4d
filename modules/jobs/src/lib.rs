//! Job applications, each owned by exactly one user.
//!
//! Every read and write goes through the owner id taken from the session;
//! a job that belongs to someone else is indistinguishable from a missing one.

pub mod api;
pub mod contract;
pub mod domain;
pub mod infra;
