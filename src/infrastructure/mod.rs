//! Adapters implementing the domain ports: the HTTP gateway, an in-memory
//! session and wallet, and a terminal step-up prompt.

pub mod console;
pub mod http_gateway;
pub mod in_memory;
