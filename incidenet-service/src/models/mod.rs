pub mod incidence;
pub mod module;
pub mod person;
pub mod plan;
pub mod role;
pub mod user;

pub use incidence::*;
pub use module::*;
pub use person::*;
pub use plan::*;
pub use role::*;
pub use user::*;
