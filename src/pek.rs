//! PEK list decryption and the secret-decryption pipeline built on top of it
//! (spec.md §4.3).

use crate::crypto;
use crate::secret::{DecryptedSecret, EncryptedSecret};

/// An ordered, decrypted list of 16-byte Password Encryption Keys.
#[derive(Debug, Clone, Default)]
pub struct PekList {
    keys: Vec<[u8; 16]>,
}

impl PekList {
    /// Decrypts the raw `PEKLIST_ENC` blob with `boot_key`, selecting the
    /// RC4 (Windows ≤ 2012 R2) or AES (Windows ≥ 2016) scheme from the
    /// 4-byte header prefix. Malformed input produces an empty list rather
    /// than failing construction — this mirrors spec.md §7's *MissingContext*
    /// handling, where a bad PEK list simply leaves every later secret
    /// decryption request with nothing to key off.
    pub fn load(raw_enc_pek: &[u8], boot_key: &[u8; 16]) -> Self {
        if raw_enc_pek.len() < 24 {
            tracing::error!(len = raw_enc_pek.len(), "encrypted PEK list is too short to parse");
            return Self::default();
        }

        let header = &raw_enc_pek[0..8];
        let mut key_material = [0u8; 16];
        key_material.copy_from_slice(&raw_enc_pek[8..24]);
        let encrypted_pek = &raw_enc_pek[24..];

        let keys = if header.starts_with(&[0x02, 0x00, 0x00, 0x00]) {
            Self::decode_scheme_a(boot_key, &key_material, encrypted_pek)
        } else if header.starts_with(&[0x03, 0x00, 0x00, 0x00]) {
            Self::decode_scheme_b(boot_key, &key_material, encrypted_pek)
        } else {
            tracing::error!(header = ?&header[..4], "unrecognized PEK list header");
            Vec::new()
        };

        Self { keys }
    }

    fn decode_scheme_a(boot_key: &[u8; 16], key_material: &[u8; 16], encrypted_pek: &[u8]) -> Vec<[u8; 16]> {
        let tmp_key = crypto::md5_boot_key_stretch(boot_key, key_material);
        let decrypted = crypto::rc4_apply(&tmp_key, encrypted_pek);

        // plaintext layout: {char header[32]; u8 decrypted_pek[]}
        if decrypted.len() <= 32 {
            return Vec::new();
        }

        decrypted[32..]
            .chunks(20)
            .filter(|block| block.len() == 20)
            .map(|block| {
                // {u8 padding[4]; u8 key[16]}
                let mut key = [0u8; 16];
                key.copy_from_slice(&block[4..20]);
                key
            })
            .collect()
    }

    fn decode_scheme_b(boot_key: &[u8; 16], key_material: &[u8; 16], encrypted_pek: &[u8]) -> Vec<[u8; 16]> {
        let decrypted = crypto::decrypt_aes(boot_key, encrypted_pek, key_material);

        let mut keys = Vec::new();
        let mut cur_index = 0u32;
        let mut pos = 0;
        while pos + 20 <= decrypted.len() {
            let entry = &decrypted[pos..pos + 20];
            let index = u32::from_le_bytes(entry[0..4].try_into().unwrap());
            if index != cur_index {
                break;
            }
            let mut key = [0u8; 16];
            key.copy_from_slice(&entry[4..20]);
            keys.push(key);
            cur_index += 1;
            pos += 20;
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[u8; 16]> {
        self.keys.get(index)
    }

    /// Strips the outer PEK-keyed encryption layer, then the optional
    /// RID-DES unwrap, per spec.md §4.3 step 2-5. Never panics or
    /// propagates an error — malformed input produces a `DecryptedSecret`
    /// sentinel, matching the original's "never raise" contract.
    pub fn decrypt_secret(
        &self,
        raw_secret: &[u8],
        rid: Option<u32>,
        is_history: bool,
        has_des: bool,
        is_adam: bool,
    ) -> DecryptedSecret {
        let enc_secret = match EncryptedSecret::parse(raw_secret) {
            Ok(s) => s,
            Err(_) => return DecryptedSecret::Error("DEC_ERROR_INIT"),
        };

        let pek_id = enc_secret.pek_id() as usize;
        let Some(pek) = self.keys.get(pek_id) else {
            tracing::warn!(pek_id, pek_count = self.keys.len(), "PEK index out of range");
            return DecryptedSecret::Error("DEC_ERROR_UNK");
        };

        let plain = match enc_secret {
            EncryptedSecret::Rc4 { salt, ciphertext, .. } => {
                let tmp_key = crypto::md5_pek_salt(pek, &salt);
                crypto::rc4_apply(&tmp_key, ciphertext)
            }
            EncryptedSecret::Aes { salt, ciphertext, .. } => crypto::decrypt_aes(pek, ciphertext, &salt),
        };

        if is_adam {
            return Self::finish_adam(&plain, rid, is_history);
        }
        Self::finish_des(&plain, rid, is_history, has_des)
    }

    fn finish_adam(plain: &[u8], rid: Option<u32>, is_history: bool) -> DecryptedSecret {
        match (is_history, rid) {
            (true, Some(_)) => match Self::unwrap_history(plain, |block| block.to_vec()) {
                Some(history) => DecryptedSecret::History(history.into_iter().map(hex::encode).collect()),
                None => DecryptedSecret::Error("DEC_ERROR_UNK"),
            },
            (_, Some(_)) => DecryptedSecret::Hex(hex::encode(plain)),
            (_, None) => DecryptedSecret::MissingRid(hex::encode(plain)),
        }
    }

    fn finish_des(plain: &[u8], rid: Option<u32>, is_history: bool, has_des: bool) -> DecryptedSecret {
        if !has_des {
            return DecryptedSecret::Raw(plain.to_vec());
        }

        match (is_history, rid) {
            (true, Some(rid)) => {
                let mut history = Vec::new();
                for block in plain.chunks(16) {
                    if block.len() < 16 {
                        break;
                    }
                    let mut b = [0u8; 16];
                    b.copy_from_slice(block);
                    history.push(hex::encode(crypto::rid_des_unwrap(&b, rid)));
                }
                DecryptedSecret::History(history)
            }
            (_, Some(rid)) => {
                if plain.len() != 16 {
                    tracing::warn!(len = plain.len(), "DES-wrapped secret is not 16 bytes");
                    return DecryptedSecret::Error("DEC_ERROR_UNK");
                }
                let mut b = [0u8; 16];
                b.copy_from_slice(plain);
                DecryptedSecret::Hex(hex::encode(crypto::rid_des_unwrap(&b, rid)))
            }
            (_, None) => DecryptedSecret::MissingRid(hex::encode(plain)),
        }
    }

    /// Parses the `count: u32 LE` + `[pad: 4, block: 16]*count` history
    /// layout shared by the ADAM history format.
    fn unwrap_history<T>(plain: &[u8], mut extract: impl FnMut(&[u8; 16]) -> T) -> Option<Vec<T>> {
        if plain.len() < 4 {
            return None;
        }
        let count = u32::from_le_bytes(plain[0..4].try_into().unwrap()) as usize;
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let start = 4 + 4 * (i + 1) + i * 16;
            let end = start + 16;
            if end > plain.len() {
                return None;
            }
            let mut block = [0u8; 16];
            block.copy_from_slice(&plain[start..end]);
            out.push(extract(&block));
        }
        Some(out)
    }
}
