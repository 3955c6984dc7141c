use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Gpio(#[from] sysfs_gpio::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
