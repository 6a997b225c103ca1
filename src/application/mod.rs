//! Application layer orchestrating a single payment.
//!
//! [`flow::FlowController`] is the entry point. It drives the capture
//! session, the step-up gate and the submitter through the domain ports, and
//! exposes its state to front ends through the pure [`view::project`].

pub mod capture;
pub mod flow;
pub mod gate;
pub mod submitter;
pub mod timer;
pub mod view;
