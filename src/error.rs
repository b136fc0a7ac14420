use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An acquiring call handed back its failure sentinel.
    #[error("{0} failed")]
    OperationFailed(&'static str),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[cfg(feature = "x11rb-backend")]
    #[error("Connect error: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),
    #[cfg(feature = "x11rb-backend")]
    #[error("Connection error: {0}")]
    Connection(#[from] x11rb::errors::ConnectionError),
    #[cfg(feature = "x11rb-backend")]
    #[error("Reply error: {0}")]
    Reply(#[from] x11rb::errors::ReplyError),
    #[cfg(feature = "x11rb-backend")]
    #[error("ReplyOrId error: {0}")]
    ReplyOrId(#[from] x11rb::errors::ReplyOrIdError),
    #[cfg(feature = "x11rb-backend")]
    #[error("X11 error: {0:?}")]
    X11(x11rb::x11_utils::X11Error),
    #[cfg(feature = "xlib-backend")]
    #[error("Can't load xlib: {0}")]
    LoadXlib(#[from] x11_dl::error::OpenError),
}

/// Turns a failure sentinel into [`Error::OperationFailed`].
#[cfg_attr(not(feature = "xlib-backend"), allow(dead_code))]
pub(crate) fn check(ok: bool, operation: &'static str) -> Result<(), Error> {
    if ok {
        Ok(())
    } else {
        log::error!("{} returned its failure value", operation);
        Err(Error::OperationFailed(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn operation_failed_message() {
        let err = check(false, "XOpenDisplay").unwrap_err();
        assert_eq!(err.to_string(), "XOpenDisplay failed");
        assert!(check(true, "XOpenDisplay").is_ok());
    }

    #[test]
    fn config_error_converts() {
        let err: Error = ConfigError::Geometry("abc".into()).into();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Invalid geometry `abc`, expected WIDTHxHEIGHT[+X+Y]"
        );
    }
}
