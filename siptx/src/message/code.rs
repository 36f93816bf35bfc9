use std::fmt;

/// Classifies SIP status codes into categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeClass {
    /// Provisional responses (1xx)
    Provisional,
    /// Successful responses (2xx)
    Success,
    /// Redirection responses (3xx)
    Redirection,
    /// Client failure responses (4xx)
    ClientError,
    /// Server failure responses (5xx)
    ServerError,
    /// Global failure responses (6xx)
    GlobalFailure,
}

/// A SIP response status code, always within `100..=699`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(u16);

/// Returned when converting a number outside `100..=699`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidStatusCode(pub u16);

impl fmt::Display for InvalidStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid status code {}", self.0)
    }
}

impl std::error::Error for InvalidStatusCode {}

macro_rules! status_codes {
    ($($name:ident = $code:literal, $reason:literal;)*) => {
        impl StatusCode {
            $(
                #[doc = concat!("`", stringify!($code), " ", $reason, "`")]
                pub const $name: StatusCode = StatusCode($code);
            )*

            /// Returns the default reason phrase for the code.
            pub fn reason(&self) -> &'static str {
                match self.0 {
                    $($code => $reason,)*
                    _ => match self.class() {
                        CodeClass::Provisional => "Provisional",
                        CodeClass::Success => "Success",
                        CodeClass::Redirection => "Redirection",
                        CodeClass::ClientError => "Client Error",
                        CodeClass::ServerError => "Server Error",
                        CodeClass::GlobalFailure => "Global Failure",
                    },
                }
            }
        }
    };
}

status_codes! {
    TRYING = 100, "Trying";
    RINGING = 180, "Ringing";
    CALL_IS_BEING_FORWARDED = 181, "Call Is Being Forwarded";
    QUEUED = 182, "Queued";
    SESSION_PROGRESS = 183, "Session Progress";
    OK = 200, "OK";
    ACCEPTED = 202, "Accepted";
    MULTIPLE_CHOICES = 300, "Multiple Choices";
    MOVED_PERMANENTLY = 301, "Moved Permanently";
    MOVED_TEMPORARILY = 302, "Moved Temporarily";
    BAD_REQUEST = 400, "Bad Request";
    UNAUTHORIZED = 401, "Unauthorized";
    FORBIDDEN = 403, "Forbidden";
    NOT_FOUND = 404, "Not Found";
    PROXY_AUTHENTICATION_REQUIRED = 407, "Proxy Authentication Required";
    REQUEST_TIMEOUT = 408, "Request Timeout";
    TEMPORARILY_UNAVAILABLE = 480, "Temporarily Unavailable";
    CALL_OR_TRANSACTION_DOES_NOT_EXIST = 481, "Call/Transaction Does Not Exist";
    BUSY_HERE = 486, "Busy Here";
    REQUEST_TERMINATED = 487, "Request Terminated";
    NOT_ACCEPTABLE_HERE = 488, "Not Acceptable Here";
    SERVER_INTERNAL_ERROR = 500, "Server Internal Error";
    SERVICE_UNAVAILABLE = 503, "Service Unavailable";
    SERVER_TIMEOUT = 504, "Server Time-out";
    BUSY_EVERYWHERE = 600, "Busy Everywhere";
    DECLINE = 603, "Decline";
}

impl StatusCode {
    /// Returns the numeric value.
    #[inline]
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the class of this code.
    pub const fn class(&self) -> CodeClass {
        match self.0 {
            100..=199 => CodeClass::Provisional,
            200..=299 => CodeClass::Success,
            300..=399 => CodeClass::Redirection,
            400..=499 => CodeClass::ClientError,
            500..=599 => CodeClass::ServerError,
            _ => CodeClass::GlobalFailure,
        }
    }

    /// Returns `true` for 1xx codes.
    #[inline]
    pub const fn is_provisional(&self) -> bool {
        matches!(self.class(), CodeClass::Provisional)
    }

    /// Returns `true` for 2xx codes.
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self.class(), CodeClass::Success)
    }

    /// Returns `true` for any code in `200..=699`.
    #[inline]
    pub const fn is_final(&self) -> bool {
        !self.is_provisional()
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = InvalidStatusCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            100..=699 => Ok(StatusCode(value)),
            other => Err(InvalidStatusCode(other)),
        }
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
