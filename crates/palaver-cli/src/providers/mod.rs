//! Console stand-ins for platform speech services.

pub mod console;

pub use console::{ConsolePermission, ConsoleRecognizer};
