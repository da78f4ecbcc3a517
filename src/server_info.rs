use serde::Serialize;

pub const APP_NAME: &str = "kubehook";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
pub struct ServerInfo {
    message: String,
    version: String,
    provider: String,
}

impl ServerInfo {
    pub fn new<T: Into<String>>(provider: T) -> Self {
        Self {
            message: format!("{}, ready to apply!", APP_NAME),
            version: APP_VERSION.into(),
            provider: provider.into(),
        }
    }
}
