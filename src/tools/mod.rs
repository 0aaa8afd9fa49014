//! Small helpers used by the logger.

pub mod id_generator;
