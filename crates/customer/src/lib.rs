//! Customer operations as sagas.
//!
//! [`CustomerCommandService`] turns a command into step inputs and runs
//! the matching saga from [`orchestrator`] against a [`CustomersClient`].
//! [`InMemoryCustomersClient`] stands in for the real customer service in
//! tests and local runs.

pub mod client;
pub mod commands;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod service;

pub use client::{CustomersClient, PartyView, ResourceKind};
pub use commands::*;
pub use error::{ClientError, CustomerError, Result};
pub use memory::{InMemoryCustomersClient, Resource};
pub use orchestrator::{CTX_CUSTOMER_ID, CTX_CUSTOMER_TYPE, CTX_PARTY_ID, register_all};
pub use service::CustomerCommandService;
