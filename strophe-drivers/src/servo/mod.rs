//! Serial-bus servo drivers

pub mod bringup;
pub mod st3215;

pub use bringup::{BringupError, ServoBus};
pub use st3215::{St3215Driver, St3215Error};
