//! Listeners that render events for a human.

pub mod plain;
pub mod rich;

pub use plain::PlainListener;
pub use rich::RichListener;
