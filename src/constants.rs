//! Frozen wire constants: well-known object-class IDs, the internal `ATT*`
//! column names bootstrap relies on, and the enumeration tables the original
//! hardcodes for interpreting specific attributes.

/// Well-known object-class governs-IDs (spec.md §3).
pub const CLASS_SCHEMA: i64 = 196_621;
pub const ATTRIBUTE_SCHEMA: i64 = 196_622;
pub const DOMAIN_DNS: i64 = 655_427;
pub const DMD: i64 = 196_617;
pub const TOP: i64 = 65_536;
pub const CONFIGURATION: i64 = 655_372;
pub const KDS_PROV_ROOT_KEY: i64 = 655_638;

/// The literal internal column name behind each well-known semantic key.
/// These cannot be discovered by scanning the schema — they're the
/// bootstrap anchors that make scanning possible in the first place.
pub const RDN: &str = "ATTm589825";
pub const PEK_LIST: &str = "ATTk590689";
pub const ATTRIBUTE_ID: &str = "ATTc131102";
pub const ATTRIBUTE_NAME_LDAP: &str = "ATTm131532";
pub const ATTRIBUTE_NAME_COMMON_NAME: &str = "ATTm3";
pub const ATTRIBUTE_NAME_DISTINGUISHED_NAME: &str = "ATTb49";
pub const MS_DS_INT_ID: &str = "ATTj591540";
pub const SAM_ACCOUNT_TYPE: &str = "ATTj590126";
pub const USER_ACCOUNT_CONTROL: &str = "ATTj589832";
pub const GOVERNS_ID: &str = "ATTc131094";
pub const OBJECT_CLASS: &str = "ATTc0";
pub const LINK_ID: &str = "ATTj131122";
pub const IS_DELETED: &str = "ATTi131120";

/// PEK list header prefixes (spec.md §4.3).
pub const PEK_HEADER_SCHEME_A: [u8; 4] = [0x02, 0x00, 0x00, 0x00];
pub const PEK_HEADER_SCHEME_B: [u8; 4] = [0x03, 0x00, 0x00, 0x00];

/// MD5 key-stretch iteration count for PEK list scheme A.
pub const MD5_STRETCH_ITERATIONS: usize = 1000;

pub const AES_BLOCK_SIZE: usize = 16;
pub const DES_BLOCK_SIZE: usize = 8;

/// `sAMAccountType` values, frozen from the original's `SAM_ACCOUNT_TYPE`.
pub mod sam_account_type {
    pub const SAM_DOMAIN_OBJECT: i64 = 0x0000_0000;
    pub const SAM_GROUP_OBJECT: i64 = 0x1000_0000;
    pub const SAM_NON_SECURITY_GROUP_OBJECT: i64 = 0x1000_0001;
    pub const SAM_ALIAS_OBJECT: i64 = 0x2000_0000;
    pub const SAM_NON_SECURITY_ALIAS_OBJECT: i64 = 0x2000_0001;
    pub const SAM_USER_OBJECT: i64 = 0x3000_0000;
    pub const SAM_NORMAL_USER_ACCOUNT: i64 = 0x3000_0000;
    pub const SAM_MACHINE_ACCOUNT: i64 = 0x3000_0001;
    pub const SAM_TRUST_ACCOUNT: i64 = 0x3000_0002;
    pub const SAM_APP_BASIC_GROUP: i64 = 0x4000_0000;
    pub const SAM_APP_QUERY_GROUP: i64 = 0x4000_0001;
    pub const SAM_ACCOUNT_TYPE_MAX: i64 = 0x7fff_ffff;
}

/// `userAccountControl` bit flags, frozen from the original's
/// `USER_ACCOUNT_CONTROL`.
pub mod user_account_control {
    pub const SCRIPT: u32 = 0x0000_0001;
    pub const ACCOUNTDISABLE: u32 = 0x0000_0002;
    pub const HOMEDIR_REQUIRED: u32 = 0x0000_0008;
    pub const LOCKOUT: u32 = 0x0000_0010;
    pub const PASSWD_NOTREQD: u32 = 0x0000_0020;
    pub const PASSWD_CANT_CHANGE: u32 = 0x0000_0040;
    pub const ENCRYPTED_TEXT_PWD_ALLOWED: u32 = 0x0000_0080;
    pub const TEMP_DUPLICATE_ACCOUNT: u32 = 0x0000_0100;
    pub const NORMAL_ACCOUNT: u32 = 0x0000_0200;
    pub const INTERDOMAIN_TRUST_ACCOUNT: u32 = 0x0000_0800;
    pub const WORKSTATION_TRUST_ACCOUNT: u32 = 0x0000_1000;
    pub const SERVER_TRUST_ACCOUNT: u32 = 0x0000_2000;
    pub const DONT_EXPIRE_PASSWORD: u32 = 0x0001_0000;
    pub const MNS_LOGON_ACCOUNT: u32 = 0x0002_0000;
    pub const SMARTCARD_REQUIRED: u32 = 0x0004_0000;
    pub const TRUSTED_FOR_DELEGATION: u32 = 0x0008_0000;
    pub const NOT_DELEGATED: u32 = 0x0010_0000;
    pub const USE_DES_KEY_ONLY: u32 = 0x0020_0000;
    pub const DONT_REQ_PREAUTH: u32 = 0x0040_0000;
    pub const PASSWORD_EXPIRED: u32 = 0x0080_0000;
    pub const TRUSTED_TO_AUTH_FOR_DELEGATION: u32 = 0x0100_0000;
    pub const PARTIAL_SECRETS_ACCOUNT: u32 = 0x0400_0000;
}

/// `msDS-SupportedEncryptionTypes` / Kerberos key type tags, frozen from the
/// original's `KERBEROS_TYPE`.
pub mod kerberos_type {
    pub const DES_CBC_CRC: i64 = 1;
    pub const DES_CBC_MD5: i64 = 3;
    pub const AES128_CTS_HMAC_SHA1_96: i64 = 17;
    pub const AES256_CTS_HMAC_SHA1_96: i64 = 18;
    /// The original table keys this one by `0xFFFFFF74`, not the canonical
    /// etype 23 — carried verbatim rather than "corrected".
    pub const RC4_HMAC: i64 = 0xFFFF_FF74;
}

/// Maps an LDAP attribute name to `(is_history, has_des)` for
/// [`crate::pek::PekList::decrypt_secret`] — without this table a caller has
/// no way to know which secret attributes need a RID-DES unwrap.
pub const ENCRYPTED_FIELDS: &[(&str, bool, bool)] = &[
    // (ldap_name, is_history, has_des)
    ("unicodePwd", false, true),
    ("ntPwdHistory", true, true),
    ("dBCSPwd", false, true),
    ("lmPwdHistory", true, true),
    ("supplementalCredentials", false, false),
    ("currentValue", false, false),
    ("priorValue", false, false),
    ("trustAuthIncoming", false, false),
    ("trustAuthOutgoing", false, false),
    ("initialAuthIncoming", false, false),
    ("initialAuthOutgoing", false, false),
];

/// Looks up `(is_history, has_des)` for an LDAP attribute name.
pub fn encrypted_field(ldap_name: &str) -> Option<(bool, bool)> {
    ENCRYPTED_FIELDS
        .iter()
        .find(|(name, _, _)| *name == ldap_name)
        .map(|(_, is_history, has_des)| (*is_history, *has_des))
}

/// LDAP attribute names whose raw bytes are a 16-byte GUID, for
/// typed-rendering classification (formatting itself is a host concern).
pub const UUID_FIELDS: &[&str] = &["objectGUID", "schemaIDGUID", "attributeSecurityGUID"];

/// LDAP attribute names carrying an 8-byte `FILETIME`-flavoured integer that
/// is itself a classic Unix-epoch-relative timestamp.
pub const DATETIME_FIELDS: &[&str] = &["whenCreated", "whenChanged"];

/// LDAP attribute names carrying a raw Windows `FILETIME` (100ns ticks since
/// 1601-01-01), distinct from the plain datetime fields above.
pub const FILETIME_FIELDS: &[&str] =
    &["lastLogon", "lastLogonTimestamp", "pwdLastSet", "accountExpires", "badPasswordTime"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypted_fields_round_trip_through_the_lookup() {
        for &(name, is_history, has_des) in ENCRYPTED_FIELDS {
            assert_eq!(encrypted_field(name), Some((is_history, has_des)));
        }
        assert_eq!(encrypted_field("notAnAttribute"), None);
    }

    #[test]
    fn unicode_pwd_needs_des_but_not_history() {
        assert_eq!(encrypted_field("unicodePwd"), Some((false, true)));
    }

    #[test]
    fn nt_pwd_history_needs_des_and_history() {
        assert_eq!(encrypted_field("ntPwdHistory"), Some((true, true)));
    }

    #[test]
    fn supplemental_credentials_need_neither() {
        assert_eq!(encrypted_field("supplementalCredentials"), Some((false, false)));
    }

    #[test]
    fn well_known_object_class_ids_are_distinct() {
        let ids = [CLASS_SCHEMA, ATTRIBUTE_SCHEMA, DOMAIN_DNS, DMD, TOP, CONFIGURATION, KDS_PROV_ROOT_KEY];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
