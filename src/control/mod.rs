//! Closed-loop control of the physical barrier.

pub mod barrier;
