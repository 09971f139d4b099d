//! The orchestrator: opens the database, runs schema resolution, DN
//! building and PEK decryption once at construction, then exposes the
//! iteration and serialization surface spec.md §4.4 describes.

use std::collections::HashMap;

use crate::constants;
use crate::dn::DnBuilder;
use crate::ese::{EseDatabase, EseRecord};
use crate::error::{NtdsError, NtdsResult};
use crate::pek::PekList;
use crate::schema::{self, KdsRootKey, Links, SchemaMaps, SchemaResolver, SecurityDescriptors};
use crate::value::Value;

pub struct NtdsCore {
    database: Box<dyn EseDatabase>,
    schema: SchemaMaps,
    dnt_to_dn: HashMap<String, Vec<String>>,
    #[allow(dead_code)] // populated for callers that want adjacency; not consumed by dump()
    links: Links,
    #[allow(dead_code)]
    security_descriptors: SecurityDescriptors,
    pek_list: PekList,
    #[allow(dead_code)]
    kds_root_keys: Vec<KdsRootKey>,
    is_adam: bool,
}

/// A serialized directory object: every resolved attribute, keyed by its
/// `(common_name, ldap_name)` schema pair, with byte values hex-encoded
/// (spec.md §4.4).
pub type SerializedRecord = HashMap<(String, String), Value>;

impl NtdsCore {
    /// Opens `database`, runs the schema bootstrap, builds `dnt_to_dn`, and
    /// decrypts the PEK list with `boot_key`. Fails only if one of the three
    /// required tables is missing — everything else is a log-and-skip.
    pub fn open(database: Box<dyn EseDatabase>, boot_key: [u8; 16]) -> NtdsResult<Self> {
        let datatable = database.table("datatable").ok_or_else(|| NtdsError::Ese("datatable".to_string()))?;
        let linktable = database.table("link_table").ok_or_else(|| NtdsError::Ese("link_table".to_string()))?;
        let sdtable = database.table("sd_table").ok_or_else(|| NtdsError::Ese("sd_table".to_string()))?;

        let (schema, links, security_descriptors, pek_source, kds_root_keys) =
            SchemaResolver::build(datatable, linktable, sdtable);

        let dnt_to_dn = DnBuilder::build(datatable, &schema.attribute_schema);

        let pek_list = match pek_source.blob() {
            Some(blob) => PekList::load(blob, &boot_key),
            None => {
                tracing::warn!("no encrypted PEK list located during schema bootstrap");
                PekList::default()
            }
        };

        Ok(Self {
            database,
            schema,
            dnt_to_dn,
            links,
            security_descriptors,
            pek_list,
            kds_root_keys,
            is_adam: pek_source.is_adam,
        })
    }

    pub fn schema(&self) -> &SchemaMaps {
        &self.schema
    }

    pub fn pek_list(&self) -> &PekList {
        &self.pek_list
    }

    pub fn is_adam(&self) -> bool {
        self.is_adam
    }

    /// Returns the object-class field as a list: a scalar becomes a
    /// singleton, a list passes through, null becomes empty.
    pub fn get_object_class(record: &dyn EseRecord) -> Vec<i64> {
        record.get(constants::OBJECT_CLASS).map(|v| v.as_int_list()).unwrap_or_default()
    }

    pub fn extract_object_id_name(&self, class_id: i64) -> Option<(String, String)> {
        self.schema.object_class_schema.resolve.get(&class_id).cloned()
    }

    /// Walks `datatable`, skipping deleted records when `skip_deleted` is
    /// set, serializing everything else. Per-record errors are logged and
    /// skipped, never fatal.
    pub fn dump(&self, skip_deleted: bool) -> impl Iterator<Item = SerializedRecord> + '_ {
        let datatable = self.database.table("datatable").expect("datatable was opened at construction");
        datatable.records().enumerate().filter_map(move |(i, record)| {
            let record = record.as_ref();
            if skip_deleted {
                let deleted = record.get(constants::IS_DELETED).map(|v| v.is_truthy()).unwrap_or(false);
                if deleted {
                    return None;
                }
            }
            match self.serialize_record(record) {
                Ok(serialized) => Some(serialized),
                Err(e) => {
                    tracing::warn!(row = i, error = %e, "failed to serialize record, skipping");
                    None
                }
            }
        })
    }

    /// Renders every column present in `attribute_schema.resolve` for this
    /// record, keyed by its `(common_name, ldap_name)` pair; columns absent
    /// from the schema are omitted.
    pub fn serialize_record(&self, record: &dyn EseRecord) -> NtdsResult<SerializedRecord> {
        Ok(schema::serialize_record(record, &self.schema.attribute_schema))
    }

    /// Looks up a record's DN, if its DNT resolved during the bootstrap
    /// fix-point.
    pub fn dn_for(&self, dnt: i64) -> Option<String> {
        self.dnt_to_dn.get(&dnt.to_string()).map(|components| components.join(","))
    }

    /// A minimal, decrypted user projection (`_plugin.py`'s
    /// `NtdsUserRecord`): one per SAM_USER/SAM_MACHINE/SAM_TRUST_ACCOUNT-classed
    /// row that carries a `unicodePwd`.
    pub fn iter_user_records(&self) -> impl Iterator<Item = UserRecord> + '_ {
        self.dump(true).filter_map(|record| self.project_user_record(&record))
    }

    /// Looks up a serialized record's value by its LDAP name alone,
    /// ignoring the common-name half of the `(common_name, ldap_name)` key.
    fn find_ldap<'r>(record: &'r SerializedRecord, ldap_name: &str) -> Option<&'r Value> {
        record.iter().find(|(names, _)| names.1 == ldap_name).map(|(_, v)| v)
    }

    fn project_user_record(&self, record: &SerializedRecord) -> Option<UserRecord> {
        let sam_type = Self::find_ldap(record, "sAMAccountType").and_then(Value::as_i64)?;

        let is_account = sam_type == constants::sam_account_type::SAM_NORMAL_USER_ACCOUNT
            || sam_type == constants::sam_account_type::SAM_MACHINE_ACCOUNT
            || sam_type == constants::sam_account_type::SAM_TRUST_ACCOUNT;
        if !is_account {
            return None;
        }

        let username = Self::find_ldap(record, "sAMAccountName").and_then(Value::as_str).map(String::from)?;
        let full_name = Self::find_ldap(record, "displayName").and_then(Value::as_str).map(String::from);

        // the RID is the last 4 bytes (little-endian) of the binary SID. By
        // the time a record reaches here it has gone through serialize_record,
        // which hex-encodes every byte value (spec.md §4.4), so objectSid
        // arrives as a hex string rather than raw bytes.
        let rid = Self::find_ldap(record, "objectSid")
            .and_then(Value::as_str)
            .and_then(|hex_sid| hex::decode(hex_sid).ok())
            .filter(|sid| sid.len() >= 4)
            .map(|sid| u32::from_le_bytes(sid[sid.len() - 4..].try_into().unwrap()));

        let nt_hash = Self::find_ldap(record, "unicodePwd").and_then(Value::as_str).and_then(|hex_blob| {
            let (is_history, has_des) = constants::encrypted_field("unicodePwd")?;
            let raw = hex::decode(hex_blob).ok()?;
            match self.pek_list.decrypt_secret(&raw, rid, is_history, has_des, self.is_adam) {
                crate::secret::DecryptedSecret::Hex(h) => Some(h),
                _ => None,
            }
        });

        let lm_hash = Self::find_ldap(record, "dBCSPwd").and_then(Value::as_str).and_then(|hex_blob| {
            let (is_history, has_des) = constants::encrypted_field("dBCSPwd")?;
            let raw = hex::decode(hex_blob).ok()?;
            match self.pek_list.decrypt_secret(&raw, rid, is_history, has_des, self.is_adam) {
                crate::secret::DecryptedSecret::Hex(h) => Some(h),
                _ => None,
            }
        });

        Some(UserRecord { rid: rid.unwrap_or_default(), username, full_name, nt_hash, lm_hash })
    }
}

/// Supplemented convenience projection grounded in `_plugin.py`'s
/// `NtdsUserRecord` — not a CSV/JSON formatter, just a typed view over the
/// fields most callers actually want.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub rid: u32,
    pub username: String,
    pub full_name: Option<String>,
    pub nt_hash: Option<String>,
    pub lm_hash: Option<String>,
}
