//! Integration test binary. Tests live in modules and run via
//! `cargo test -p integration`.

mod helpers;

mod basic_operations;
mod sorted_sets;
mod store_commands;

fn main() {}
