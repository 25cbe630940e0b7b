pub mod credentials;
pub mod time;

pub use credentials::*;
pub use time::*;
