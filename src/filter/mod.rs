//! Record filtering policy.

pub mod policy;

pub use policy::{DropRule, RecordPolicy};
