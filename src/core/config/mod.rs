pub mod base;
pub mod constant;
pub mod entity;

pub use self::base::*;
pub use constant::*;
pub use entity::*;
