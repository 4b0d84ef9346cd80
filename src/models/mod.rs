// Data models

pub mod subscription;
pub mod validation;

pub use subscription::*;
pub use validation::*;
