pub mod config;
pub mod dsml;
pub mod engine;
pub mod ldap;
pub mod transport;

pub use config::GatewayConfig;
pub use engine::DsmlEngine;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("could not connect: {0}")]
    Connect(String),

    #[error("bind rejected: {0}")]
    BindRejected(String),

    #[error("malformed batch request: {0}")]
    MalformedRequest(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
