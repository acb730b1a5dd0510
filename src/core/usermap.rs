// src/core/usermap.rs

//! Certificate and distinguished-name to user id mapping.
//!
//! The mapping is done by a separate identity-registry facility and is never
//! cached: every call goes straight to the [`IdentityMapper`]. This module only
//! fixes the response shape and checks the inputs against the facility limits.

use crate::core::block::USER_ID_MAX_LEN;
use thiserror::Error;
use tracing::debug;

/// Longest distinguished name the facility accepts, in bytes.
pub const DISTINGUISHED_NAME_MAX_LEN: usize = 246;

/// Longest registry name the facility accepts, in bytes.
pub const REGISTRY_NAME_MAX_LEN: usize = 255;

/// Rejected mapping input. The facility is not called when these are returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserMapError {
    #[error("certificate is empty")]
    EmptyCertificate,

    #[error("distinguished name is {len} bytes, the limit is {max}")]
    DistinguishedNameTooLong { len: usize, max: usize },

    #[error("registry name is {len} bytes, the limit is {max}")]
    RegistryNameTooLong { len: usize, max: usize },
}

/// The answer of the identity-mapping facility, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperResponse {
    /// The mapped user id; empty when no mapping exists.
    pub user_id: String,
    /// Return code of the mapping service call.
    pub rc: i32,
    pub saf_rc: i32,
    pub racf_rc: i32,
    /// RACF reason code.
    pub racf_rs: i32,
}

impl MapperResponse {
    /// Builds a response from the raw, NUL or blank padded user id field.
    pub fn from_raw(raw_user_id: &[u8], rc: i32, saf_rc: i32, racf_rc: i32, racf_rs: i32) -> Self {
        let raw = &raw_user_id[..raw_user_id.len().min(USER_ID_MAX_LEN)];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Self {
            user_id: String::from_utf8_lossy(&raw[..end]).trim_end().to_string(),
            rc,
            saf_rc,
            racf_rc,
            racf_rs,
        }
    }

    /// True when every return code is zero and a user id was mapped.
    pub fn is_success(&self) -> bool {
        self.rc == 0
            && self.saf_rc == 0
            && self.racf_rc == 0
            && self.racf_rs == 0
            && !self.user_id.is_empty()
    }
}

/// The identity-mapping facility.
pub trait IdentityMapper: Send + Sync {
    /// Maps a DER-encoded certificate to a user id.
    fn map_certificate(&self, certificate: &[u8]) -> MapperResponse;

    /// Maps a distinguished name, issued within `registry`, to a user id.
    fn map_distinguished_name(&self, distinguished_name: &str, registry: &str) -> MapperResponse;
}

/// Checks the certificate and asks `mapper` for its user id.
pub fn map_certificate<M>(mapper: &M, certificate: &[u8]) -> Result<MapperResponse, UserMapError>
where
    M: IdentityMapper + ?Sized,
{
    if certificate.is_empty() {
        return Err(UserMapError::EmptyCertificate);
    }
    let response = mapper.map_certificate(certificate);
    debug!(
        "Certificate of {} bytes mapped to '{}' (rc={}, saf_rc={}, racf_rc={}, racf_rs={})",
        certificate.len(),
        response.user_id,
        response.rc,
        response.saf_rc,
        response.racf_rc,
        response.racf_rs
    );
    Ok(response)
}

/// Checks the name lengths and asks `mapper` for the user id of a distinguished name.
pub fn map_distinguished_name<M>(
    mapper: &M,
    distinguished_name: &str,
    registry: &str,
) -> Result<MapperResponse, UserMapError>
where
    M: IdentityMapper + ?Sized,
{
    if distinguished_name.len() > DISTINGUISHED_NAME_MAX_LEN {
        return Err(UserMapError::DistinguishedNameTooLong {
            len: distinguished_name.len(),
            max: DISTINGUISHED_NAME_MAX_LEN,
        });
    }
    if registry.len() > REGISTRY_NAME_MAX_LEN {
        return Err(UserMapError::RegistryNameTooLong {
            len: registry.len(),
            max: REGISTRY_NAME_MAX_LEN,
        });
    }
    let response = mapper.map_distinguished_name(distinguished_name, registry);
    debug!(
        "Distinguished name '{}' in '{}' mapped to '{}' (rc={}, racf_rc={}, racf_rs={})",
        distinguished_name, registry, response.user_id, response.rc, response.racf_rc, response.racf_rs
    );
    Ok(response)
}
