use crossbeam::channel::SendError;
use failure::{Context, Fail};
use std::fmt::Display;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}
#[derive(Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "{}", _0)]
    InvalidPoolSize(String),

    #[fail(display = "{}", _0)]
    Rejected(String),

    #[fail(display = "{}", _0)]
    Misuse(String),

    #[fail(display = "{}", _0)]
    Disconnected(String),
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.inner.get_context()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl From<ErrorKind> for Error {
    fn from(err: ErrorKind) -> Self {
        Error {
            inner: Context::new(err),
        }
    }
}

impl<T> From<SendError<T>> for Error {
    fn from(err: SendError<T>) -> Self {
        Error {
            inner: Context::new(ErrorKind::Disconnected(err.to_string())),
        }
    }
}
