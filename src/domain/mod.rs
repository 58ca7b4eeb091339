pub mod member;
pub mod payment;
pub mod phone;
pub mod plan;
pub mod reference;

pub use member::*;
pub use payment::*;
pub use phone::*;
pub use plan::*;
pub use reference::*;
