//! Parsing of the `ENC_SECRET` wire format (spec.md §3 "EncryptedSecret").

/// Algorithm IDs recognized in the 16-bit header of an encrypted secret.
pub mod algo {
    pub const DB_RC4: u16 = 0x10;
    pub const DB_RC4_SALT: u16 = 0x11;
    pub const REP_RC4_SALT: u16 = 0x12;
    pub const DB_AES: u16 = 0x13;
}

/// A parsed, still-encrypted secret attribute.
#[derive(Debug, Clone, Copy)]
pub enum EncryptedSecret<'a> {
    Rc4 {
        pek_id: u32,
        salt: [u8; 16],
        ciphertext: &'a [u8],
    },
    Aes {
        pek_id: u32,
        salt: [u8; 16],
        plain_len: u32,
        ciphertext: &'a [u8],
    },
}

/// The header was not one of the four recognized algorithm IDs.
#[derive(Debug)]
pub struct UnknownAlgorithm(pub u16);

impl<'a> EncryptedSecret<'a> {
    /// Parses the `{u16 algo; u16 flags; u32 pek_id; u8 salt[16]; ...}`
    /// layouts described in spec.md §3, selecting the RC4 or AES variant by
    /// the algorithm ID.
    pub fn parse(data: &'a [u8]) -> Result<Self, UnknownAlgorithm> {
        if data.len() < 4 {
            return Err(UnknownAlgorithm(0));
        }
        let algo_id = u16::from_le_bytes([data[0], data[1]]);

        match algo_id {
            algo::DB_RC4 | algo::DB_RC4_SALT | algo::REP_RC4_SALT => {
                if data.len() < 24 {
                    return Err(UnknownAlgorithm(algo_id));
                }
                let pek_id = u32::from_le_bytes(data[4..8].try_into().unwrap());
                let mut salt = [0u8; 16];
                salt.copy_from_slice(&data[8..24]);
                Ok(EncryptedSecret::Rc4 {
                    pek_id,
                    salt,
                    ciphertext: &data[24..],
                })
            }
            algo::DB_AES => {
                if data.len() < 28 {
                    return Err(UnknownAlgorithm(algo_id));
                }
                let pek_id = u32::from_le_bytes(data[4..8].try_into().unwrap());
                let mut salt = [0u8; 16];
                salt.copy_from_slice(&data[8..24]);
                let plain_len = u32::from_le_bytes(data[24..28].try_into().unwrap());
                Ok(EncryptedSecret::Aes {
                    pek_id,
                    salt,
                    plain_len,
                    ciphertext: &data[28..],
                })
            }
            other => Err(UnknownAlgorithm(other)),
        }
    }

    pub fn pek_id(&self) -> u32 {
        match self {
            EncryptedSecret::Rc4 { pek_id, .. } => *pek_id,
            EncryptedSecret::Aes { pek_id, .. } => *pek_id,
        }
    }
}

/// The outcome of [`crate::pek::PekList::decrypt_secret`].
#[derive(Debug, Clone, PartialEq)]
pub enum DecryptedSecret {
    /// The raw decrypted bytes, when no RID or DES unwrap applies.
    Raw(Vec<u8>),
    /// A single hex-encoded value (ADAM without history, or an unwrapped
    /// DES secret without history).
    Hex(String),
    /// One hex-encoded value per history entry.
    History(Vec<String>),
    /// No RID was supplied, so the buffer couldn't be unwrapped; the hex of
    /// the still-wrapped buffer is carried in the sentinel per spec.md.
    MissingRid(String),
    /// Parsing or decryption failed; `DEC_ERROR_INIT` for an unrecognized
    /// algorithm ID, `DEC_ERROR_UNK` for anything else.
    Error(&'static str),
}
