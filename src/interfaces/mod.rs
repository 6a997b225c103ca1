//! Outer surfaces: file formats the flow writes to.

pub mod csv;
