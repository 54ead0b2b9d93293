//! A small SIL-like emission layer: values, cleanups, destinations and conversions.

pub mod builder;
pub mod convert;
pub mod destination;
pub mod managed;
