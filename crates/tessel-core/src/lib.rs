//! Core types of the Tessel shading language.
//!
//! This crate holds the data shared by every stage of the front end: interned
//! identifiers, the expression type lattice, compile-time constant values,
//! attribute and builtin enumerations, and the intrinsic function catalogue.

pub mod attribute;
pub mod constant;
pub mod identifier;
pub mod intrinsic;
pub mod types;
