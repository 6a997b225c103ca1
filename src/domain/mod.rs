//! Domain layer: value objects for the payment being initiated and the ports
//! through which the flow reaches devices, the gateway and the session.

pub mod intent;
pub mod money;
pub mod ports;
pub mod receipt;
pub mod target;
