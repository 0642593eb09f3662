pub mod patient;
pub mod profile;
pub mod report;
pub mod user;

pub use patient::*;
pub use profile::*;
pub use report::*;
pub use user::*;
