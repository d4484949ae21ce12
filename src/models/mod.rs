//! Data models

pub mod school;
pub mod student;
pub mod attendance;
pub mod performance;
pub mod risk_flag;
pub mod message;

pub use school::*;
pub use student::*;
pub use attendance::*;
pub use performance::*;
pub use risk_flag::*;
pub use message::*;
