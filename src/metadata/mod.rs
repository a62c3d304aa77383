//! Identifiers carried over from the native binary's metadata.
//!
//! Only the [`token::Token`] survives into generated code; everything else
//! the IL2CPP metadata describes is already part of the arena.

pub mod token;
