pub mod enigo_injector;
pub mod injector;

pub use enigo_injector::EnigoInjector;
pub use injector::{OutputMode, TextInjector};
