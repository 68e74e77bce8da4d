use serde::Deserialize;

use crate::contract::Registration;

/// Registration form body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password1: String,
}

/// Logon form body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogonForm {
    pub email: String,
    pub password: String,
}

impl From<RegisterForm> for Registration {
    fn from(f: RegisterForm) -> Self {
        Self {
            name: f.name,
            email: f.email,
            password: f.password,
            password1: f.password1,
        }
    }
}
