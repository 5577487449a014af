// sable-vm - Virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Opcode handlers, grouped by instruction family.

pub mod arithmetic;
pub mod comparison;
pub mod constants;
pub mod control;
pub mod objects;
pub mod variables;
