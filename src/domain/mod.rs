pub mod cart;
pub mod food;
pub mod order;
pub mod user;

pub use cart::*;
pub use food::*;
pub use order::*;
pub use user::*;
