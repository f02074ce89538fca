pub mod update;

pub use update::{MarketUpdate, Price};
