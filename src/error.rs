/// Fatal daemon errors and the exit status each one maps to.

use crate::config::ConfigError;
use crate::driver::DriverError;
use crate::link::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("LED driver init failed: {0}")]
    DriverInit(#[source] DriverError),
    #[error("vehicle link failed: {0}")]
    Link(#[from] LinkError),
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),
    #[error("render state still in use at shutdown")]
    RenderStateShared,
}

impl Error {
    /// Process exit status for this failure. Driver failures keep their
    /// driver code; link failures exit with -1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::DriverInit(e) => e.code(),
            Error::Link(_) => -1,
            Error::Config(_) | Error::Signal(_) | Error::RenderStateShared => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn exit_codes() {
        assert_eq!(Error::DriverInit(DriverError::MailboxDevice).exit_code(), -9);
        assert_eq!(Error::Link(LinkError::NoAutopilot(Duration::from_secs(3))).exit_code(), -1);
        assert_eq!(Error::Config(ConfigError::NoArms).exit_code(), 1);
    }

    #[test]
    fn messages_carry_cause() {
        let e = Error::DriverInit(DriverError::IllegalGpio);
        assert_eq!(e.to_string(), "LED driver init failed: selected GPIO not possible");
    }
}
