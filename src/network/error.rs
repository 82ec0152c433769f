//! Failure taxonomy of collaborator calls.

use std::fmt;
use std::time::Duration;

/// A collaborator operation, used to label failures and build URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET getLocalIPAddress`
    LocalIpAddress,
    /// `GET internetHealthyCheck`
    InternetHealth,
    /// `POST setupNewWifi`
    SetupWifi,
    /// `POST factoryResetForBle`
    FactoryReset,
    /// `GET getBleServiceName`
    BleServiceName,
    /// Local reset executable.
    ResetCommand,
}

impl Endpoint {
    /// Path relative to the service base, or the command label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalIpAddress => "getLocalIPAddress",
            Self::InternetHealth => "internetHealthyCheck",
            Self::SetupWifi => "setupNewWifi",
            Self::FactoryReset => "factoryResetForBle",
            Self::BleServiceName => "getBleServiceName",
            Self::ResetCommand => "reset command",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad class of a [`NetworkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Collaborator unreachable, too slow, or answered with a non-success status.
    Transport,
    /// Answer was not JSON of the expected shape.
    Decode,
    /// Collaborator ran the request and reported failure.
    Actuation,
}

/// Errors returned by collaborator calls.
#[derive(Debug)]
pub enum NetworkError {
    /// Connection or I/O failure.
    Transport { endpoint: Endpoint, reason: String },
    /// No answer within the bound.
    Timeout { endpoint: Endpoint, after: Duration },
    /// Non-success HTTP status.
    HttpStatus { endpoint: Endpoint, code: u16 },
    /// Malformed answer.
    Decode { endpoint: Endpoint, reason: String },
    /// Collaborator reported failure.
    Actuation { endpoint: Endpoint, reason: String },
}

impl NetworkError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => {
                FailureKind::Transport
            }
            Self::Decode { .. } => FailureKind::Decode,
            Self::Actuation { .. } => FailureKind::Actuation,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::HttpStatus { endpoint, .. }
            | Self::Decode { endpoint, .. }
            | Self::Actuation { endpoint, .. } => *endpoint,
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { endpoint, reason } => {
                write!(f, "{}: transport error: {}", endpoint, reason)
            }
            Self::Timeout { endpoint, after } => {
                write!(f, "{}: no answer within {:?}", endpoint, after)
            }
            Self::HttpStatus { endpoint, code } => write!(f, "{}: HTTP status {}", endpoint, code),
            Self::Decode { endpoint, reason } => {
                write!(f, "{}: malformed answer: {}", endpoint, reason)
            }
            Self::Actuation { endpoint, reason } => write!(f, "{}: {}", endpoint, reason),
        }
    }
}

impl std::error::Error for NetworkError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let timeout = NetworkError::Timeout {
            endpoint: Endpoint::SetupWifi,
            after: Duration::from_secs(10),
        };
        assert_eq!(timeout.kind(), FailureKind::Transport);
        assert_eq!(timeout.endpoint(), Endpoint::SetupWifi);

        let status = NetworkError::HttpStatus {
            endpoint: Endpoint::LocalIpAddress,
            code: 503,
        };
        assert_eq!(status.kind(), FailureKind::Transport);

        let decode = NetworkError::Decode {
            endpoint: Endpoint::InternetHealth,
            reason: "expected value".into(),
        };
        assert_eq!(decode.kind(), FailureKind::Decode);

        let actuation = NetworkError::Actuation {
            endpoint: Endpoint::SetupWifi,
            reason: "service reported failure".into(),
        };
        assert_eq!(actuation.kind(), FailureKind::Actuation);
    }

    #[test]
    fn test_display_names_endpoint() {
        let err = NetworkError::HttpStatus {
            endpoint: Endpoint::InternetHealth,
            code: 500,
        };
        assert_eq!(err.to_string(), "internetHealthyCheck: HTTP status 500");
    }
}
