//! A small single-coordinator MapReduce job execution engine.

pub mod mr;
