//! Storebot Tool System
//!
//! The tool registry, capability sets, executor, and the storefront
//! tool implementations. Authorization is data: an agent can only
//! reach tools named by its capability set, and the executor verifies
//! membership again at execution time.

pub mod admin;
pub mod customer;
pub mod executor;
pub mod format;
pub mod registry;

#[cfg(test)]
pub mod testing;

pub use executor::ToolExecutor;
pub use registry::{
    validate_arguments, CapabilitySet, ToolRegistry, ToolSpec, ADMIN_CAPABILITY_SET,
    CUSTOMER_CAPABILITY_SET,
};
