// src/core/codec.rs

//! Decodes the raw byte codes reported by the AT-TLS facility into closed,
//! typed value sets.
//!
//! Decoding is total over the input byte range: every byte either maps to
//! exactly one variant or yields an [`UnrecognizedCode`] naming the domain and
//! the raw value. There is no fallback variant.

use crate::core::errors::{CodeDomain, UnrecognizedCode};
use bitflags::bitflags;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// A closed value set identified by a single raw byte.
pub trait ByteCode: Sized + Copy + IntoEnumIterator {
    /// The domain reported in decode failures.
    const DOMAIN: CodeDomain;

    /// The raw byte this value is reported as.
    fn code(self) -> u8;

    /// Maps a raw byte to its variant.
    fn decode(code: u8) -> Result<Self, UnrecognizedCode> {
        Self::iter()
            .find(|v| v.code() == code)
            .ok_or_else(|| UnrecognizedCode::single(Self::DOMAIN, code))
    }
}

/// Policy status for the connection at the time of policy lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum StatPolicy {
    /// The AT-TLS function is off.
    Off,
    /// No policy is defined for the connection.
    NoPolicy,
    /// A policy is defined but AT-TLS is not enabled.
    NotEnabled,
    /// A policy is defined and AT-TLS is enabled.
    Enabled,
    /// AT-TLS is enabled and the application controls the secure session.
    ApplicationControlled,
}

impl ByteCode for StatPolicy {
    const DOMAIN: CodeDomain = CodeDomain::StatPolicy;

    fn code(self) -> u8 {
        match self {
            StatPolicy::Off => 1,
            StatPolicy::NoPolicy => 2,
            StatPolicy::NotEnabled => 3,
            StatPolicy::Enabled => 4,
            StatPolicy::ApplicationControlled => 5,
        }
    }
}

/// Security status of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum StatConn {
    NotSecure,
    HandshakeInProgress,
    Secure,
}

impl StatConn {
    pub fn is_secure(self) -> bool {
        self == StatConn::Secure
    }
}

impl ByteCode for StatConn {
    const DOMAIN: CodeDomain = CodeDomain::StatConn;

    fn code(self) -> u8 {
        match self {
            StatConn::NotSecure => 1,
            StatConn::HandshakeInProgress => 2,
            StatConn::Secure => 3,
        }
    }
}

/// The role AT-TLS plays on the connection, as defined by policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum SecurityType {
    /// No policy applies, e.g. AT-TLS is not enabled.
    Unknown,
    Client,
    Server,
    /// Server with client authentication, ClientAuthType = PassThru.
    ServerClientAuthPassThru,
    /// Server with client authentication, ClientAuthType = Full.
    ServerClientAuthFull,
    /// Server with client authentication, ClientAuthType = Required.
    ServerClientAuthRequired,
    /// Server with client authentication, ClientAuthType = SAFCheck.
    ServerClientAuthSafCheck,
}

impl SecurityType {
    /// True for the server types that request a client certificate.
    pub fn requests_client_certificate(self) -> bool {
        matches!(
            self,
            SecurityType::ServerClientAuthPassThru
                | SecurityType::ServerClientAuthFull
                | SecurityType::ServerClientAuthRequired
                | SecurityType::ServerClientAuthSafCheck
        )
    }
}

impl ByteCode for SecurityType {
    const DOMAIN: CodeDomain = CodeDomain::SecurityType;

    fn code(self) -> u8 {
        match self {
            SecurityType::Unknown => 0,
            SecurityType::Client => 1,
            SecurityType::Server => 2,
            SecurityType::ServerClientAuthPassThru => 3,
            SecurityType::ServerClientAuthFull => 4,
            SecurityType::ServerClientAuthRequired => 5,
            SecurityType::ServerClientAuthSafCheck => 6,
        }
    }
}

/// FIPS 140 compliance level of the secure connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Fips140 {
    Off,
    On,
    Level1,
    Level2,
    Level3,
}

impl ByteCode for Fips140 {
    const DOMAIN: CodeDomain = CodeDomain::Fips140;

    fn code(self) -> u8 {
        match self {
            Fips140::Off => 0,
            Fips140::On => 1,
            Fips140::Level1 => 2,
            Fips140::Level2 => 3,
            Fips140::Level3 => 4,
        }
    }
}

macro_rules! impl_try_from_byte {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TryFrom<u8> for $ty {
                type Error = UnrecognizedCode;

                fn try_from(code: u8) -> Result<Self, Self::Error> {
                    <$ty as ByteCode>::decode(code)
                }
            }
        )*
    };
}

impl_try_from_byte!(StatPolicy, StatConn, SecurityType, Fips140);

/// The SSL/TLS protocol in use, keyed by (version, modifier).
///
/// TLS sub-versions share major version 3, so a single byte is not enough to
/// identify a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Protocol {
    NonSecure,
    Ssl2,
    Ssl3,
    #[strum(serialize = "TLSv1.0")]
    Tls1_0,
    #[strum(serialize = "TLSv1.1")]
    Tls1_1,
    #[strum(serialize = "TLSv1.2")]
    Tls1_2,
    #[strum(serialize = "TLSv1.3")]
    Tls1_3,
}

impl Protocol {
    /// The (version, modifier) byte pair reported by the facility.
    pub fn code(self) -> (u8, u8) {
        match self {
            Protocol::NonSecure => (0, 0),
            Protocol::Ssl2 => (2, 0),
            Protocol::Ssl3 => (3, 0),
            Protocol::Tls1_0 => (3, 1),
            Protocol::Tls1_1 => (3, 2),
            Protocol::Tls1_2 => (3, 3),
            Protocol::Tls1_3 => (3, 4),
        }
    }

    pub fn version(self) -> u8 {
        self.code().0
    }

    pub fn modifier(self) -> u8 {
        self.code().1
    }

    pub fn decode(version: u8, modifier: u8) -> Result<Self, UnrecognizedCode> {
        Self::iter()
            .find(|p| p.code() == (version, modifier))
            .ok_or_else(|| UnrecognizedCode::pair(CodeDomain::Protocol, version, modifier))
    }

    pub fn is_secure(self) -> bool {
        self != Protocol::NonSecure
    }

    /// Write-cipher resets and session tickets require TLS 1.3 or later.
    pub fn is_tls13_or_later(self) -> bool {
        self == Protocol::Tls1_3
    }
}

bitflags! {
    /// The connection flag byte. Reserved for the facility; unknown bits are kept.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttlsFlags: u8 {
        /// The connection is an FTP data connection.
        const FTP_DATA_CONNECTION = 0x01;
    }
}
