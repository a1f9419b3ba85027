use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("handler name must not be empty")]
    EmptyName,
}

pub type Result<T> = std::result::Result<T, RegistryError>;
