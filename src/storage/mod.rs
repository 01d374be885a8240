//! # Durable Storage
//!
//! The embedded persistence layer behind the local backend. The [`Dataset`]
//! owns a redb database holding one table of name -> snapshot entries;
//! stores never touch redb directly.

pub mod dataset;

pub use dataset::Dataset;
