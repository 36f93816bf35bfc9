use std::fmt;
use std::str::FromStr;

/// A SIP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SipMethod {
    Invite,
    Ack,
    Bye,
    Cancel,
    Register,
    Options,
    Info,
    Notify,
    Subscribe,
    Update,
    Refer,
    Prack,
    Message,
    Publish,
    /// Any method this crate has no name for.
    Unknown,
}

impl SipMethod {
    /// Returns the wire token of the method.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SipMethod::Invite => "INVITE",
            SipMethod::Ack => "ACK",
            SipMethod::Bye => "BYE",
            SipMethod::Cancel => "CANCEL",
            SipMethod::Register => "REGISTER",
            SipMethod::Options => "OPTIONS",
            SipMethod::Info => "INFO",
            SipMethod::Notify => "NOTIFY",
            SipMethod::Subscribe => "SUBSCRIBE",
            SipMethod::Update => "UPDATE",
            SipMethod::Refer => "REFER",
            SipMethod::Prack => "PRACK",
            SipMethod::Message => "MESSAGE",
            SipMethod::Publish => "PUBLISH",
            SipMethod::Unknown => "UNKNOWN",
        }
    }

    pub const fn is_invite(&self) -> bool {
        matches!(self, Self::Invite)
    }

    pub const fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }
}

impl From<&[u8]> for SipMethod {
    fn from(value: &[u8]) -> Self {
        match value {
            b"INVITE" => SipMethod::Invite,
            b"ACK" => SipMethod::Ack,
            b"BYE" => SipMethod::Bye,
            b"CANCEL" => SipMethod::Cancel,
            b"REGISTER" => SipMethod::Register,
            b"OPTIONS" => SipMethod::Options,
            b"INFO" => SipMethod::Info,
            b"NOTIFY" => SipMethod::Notify,
            b"SUBSCRIBE" => SipMethod::Subscribe,
            b"UPDATE" => SipMethod::Update,
            b"REFER" => SipMethod::Refer,
            b"PRACK" => SipMethod::Prack,
            b"MESSAGE" => SipMethod::Message,
            b"PUBLISH" => SipMethod::Publish,
            _ => SipMethod::Unknown,
        }
    }
}

impl FromStr for SipMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.as_bytes()))
    }
}

impl fmt::Display for SipMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
