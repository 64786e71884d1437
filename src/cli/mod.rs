//! Terminal output for the `ability-check` binary

mod console;

pub use console::Console;
