pub mod install;
pub mod service;
pub mod uninstall;
