pub mod cmdargs;
pub mod config;
pub mod crypto;
pub mod error;
pub mod git;
pub mod http;
pub mod k8s;
pub mod logging;
pub mod providers;
pub mod server_info;
pub mod service;
pub mod webhook;
