// src/core/block.rs

//! The fixed-size metadata block returned by a metadata query, and its
//! single-pass decoding into [`SessionInfo`].

use crate::core::codec::{AttlsFlags, ByteCode, Fips140, Protocol, SecurityType, StatConn, StatPolicy};
use crate::core::errors::UnrecognizedCode;

/// Length of the metadata block in bytes.
pub const METADATA_BLOCK_LEN: usize = 26;

/// Maximum length of the partner user id.
pub const USER_ID_MAX_LEN: usize = 8;

const OFF_STAT_POLICY: usize = 0;
const OFF_STAT_CONN: usize = 1;
const OFF_PROT_VER: usize = 2;
const OFF_PROT_MOD: usize = 3;
const OFF_CIPHER2: usize = 4;
const OFF_SEC_TYPE: usize = 6;
const OFF_FIPS140: usize = 7;
const OFF_FLAGS: usize = 8;
const OFF_USER_ID_LEN: usize = 9;
const OFF_USER_ID: usize = 10;
const OFF_CIPHER4: usize = 18;
const OFF_KEY_SHARE: usize = 22;

/// The raw metadata block as delivered by the facility adapter.
///
/// Text fields are already in the host character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataBlock([u8; METADATA_BLOCK_LEN]);

impl MetadataBlock {
    pub const fn new(raw: [u8; METADATA_BLOCK_LEN]) -> Self {
        Self(raw)
    }

    pub fn builder() -> MetadataBlockBuilder {
        MetadataBlockBuilder::default()
    }

    pub fn as_bytes(&self) -> &[u8; METADATA_BLOCK_LEN] {
        &self.0
    }

    fn byte(&self, offset: usize) -> u8 {
        self.0[offset]
    }

    fn text(&self, offset: usize, len: usize) -> String {
        decode_text(&self.0[offset..offset + len])
    }
}

impl Default for MetadataBlock {
    fn default() -> Self {
        Self([0; METADATA_BLOCK_LEN])
    }
}

impl From<[u8; METADATA_BLOCK_LEN]> for MetadataBlock {
    fn from(raw: [u8; METADATA_BLOCK_LEN]) -> Self {
        Self(raw)
    }
}

/// Cuts a fixed-width text field at the first NUL and drops trailing blanks.
fn decode_text(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim_end().to_string()
}

/// Builds a metadata block from raw codes. Intended for facility adapters and
/// test doubles; codes are not validated.
#[derive(Debug, Clone, Default)]
pub struct MetadataBlockBuilder {
    raw: [u8; METADATA_BLOCK_LEN],
}

impl MetadataBlockBuilder {
    pub fn stat_policy(mut self, code: u8) -> Self {
        self.raw[OFF_STAT_POLICY] = code;
        self
    }

    pub fn stat_conn(mut self, code: u8) -> Self {
        self.raw[OFF_STAT_CONN] = code;
        self
    }

    pub fn protocol(mut self, version: u8, modifier: u8) -> Self {
        self.raw[OFF_PROT_VER] = version;
        self.raw[OFF_PROT_MOD] = modifier;
        self
    }

    pub fn negotiated_cipher2(mut self, cipher: &str) -> Self {
        self.put_text(OFF_CIPHER2, 2, cipher);
        self
    }

    pub fn security_type(mut self, code: u8) -> Self {
        self.raw[OFF_SEC_TYPE] = code;
        self
    }

    pub fn fips140(mut self, code: u8) -> Self {
        self.raw[OFF_FIPS140] = code;
        self
    }

    pub fn flags(mut self, flags: u8) -> Self {
        self.raw[OFF_FLAGS] = flags;
        self
    }

    /// Sets the user id and its length byte. Ids longer than eight bytes are cut.
    pub fn user_id(mut self, user_id: &str) -> Self {
        let len = self.put_text(OFF_USER_ID, USER_ID_MAX_LEN, user_id);
        self.raw[OFF_USER_ID_LEN] = len as u8;
        self
    }

    /// Overrides the reported user id length without touching the id bytes.
    pub fn user_id_len(mut self, len: u8) -> Self {
        self.raw[OFF_USER_ID_LEN] = len;
        self
    }

    pub fn negotiated_cipher4(mut self, cipher: &str) -> Self {
        self.put_text(OFF_CIPHER4, 4, cipher);
        self
    }

    pub fn negotiated_key_share(mut self, key_share: &str) -> Self {
        self.put_text(OFF_KEY_SHARE, 4, key_share);
        self
    }

    pub fn build(self) -> MetadataBlock {
        MetadataBlock(self.raw)
    }

    fn put_text(&mut self, offset: usize, width: usize, text: &str) -> usize {
        let field = &mut self.raw[offset..offset + width];
        field.fill(0);
        let len = text.len().min(width);
        field[..len].copy_from_slice(&text.as_bytes()[..len]);
        len
    }
}

/// All ten scalar fields of one metadata query, decoded together.
///
/// Enum fields keep their decode outcome so that an unknown code fails only
/// the accessor of that field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub stat_policy: Result<StatPolicy, UnrecognizedCode>,
    pub stat_conn: Result<StatConn, UnrecognizedCode>,
    pub protocol: Result<Protocol, UnrecognizedCode>,
    /// Two-character cipher code; `4X` when the cipher needs four characters.
    pub negotiated_cipher2: String,
    pub security_type: Result<SecurityType, UnrecognizedCode>,
    pub user_id: String,
    pub fips140: Result<Fips140, UnrecognizedCode>,
    pub flags: AttlsFlags,
    pub negotiated_cipher4: String,
    /// Only set for TLSv1.3 or later.
    pub negotiated_key_share: String,
}

impl SessionInfo {
    pub fn decode(block: &MetadataBlock) -> Self {
        let user_id_len = usize::from(block.byte(OFF_USER_ID_LEN)).min(USER_ID_MAX_LEN);

        Self {
            stat_policy: StatPolicy::decode(block.byte(OFF_STAT_POLICY)),
            stat_conn: StatConn::decode(block.byte(OFF_STAT_CONN)),
            protocol: Protocol::decode(block.byte(OFF_PROT_VER), block.byte(OFF_PROT_MOD)),
            negotiated_cipher2: block.text(OFF_CIPHER2, 2),
            security_type: SecurityType::decode(block.byte(OFF_SEC_TYPE)),
            user_id: block.text(OFF_USER_ID, user_id_len),
            fips140: Fips140::decode(block.byte(OFF_FIPS140)),
            flags: AttlsFlags::from_bits_retain(block.byte(OFF_FLAGS)),
            negotiated_cipher4: block.text(OFF_CIPHER4, 4),
            negotiated_key_share: block.text(OFF_KEY_SHARE, 4),
        }
    }
}
