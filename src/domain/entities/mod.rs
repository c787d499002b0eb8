pub mod company;
pub mod holding;
pub mod news;
pub mod session;
