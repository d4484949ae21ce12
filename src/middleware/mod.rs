//! Request middleware

pub mod actor;
