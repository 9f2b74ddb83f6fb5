//! Credentials: password digests, input validation and the registration socket

mod password;
mod registration;
mod validation;

pub use password::hash_password;
pub use registration::{
    RegistrationClient, SocketConnector, SocketTransport, WsConnector, WsTransport,
};
pub use validation::{
    MIN_PASSWORD_LEN, check_password_strength, is_valid_email, validate_login,
    validate_registration,
};
