pub mod command;
pub mod context;
pub mod convert;
pub mod domain;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod flywheel;
pub mod fs_util;
pub mod layout;
