//! Bootstraps the directory schema by scanning `datatable` itself
//! (spec.md §4.1). Column identifiers like `ATTm131532` only resolve once
//! the rows that describe them have been read — the first pass over the
//! database both reads data and builds the map needed to read later data.

use std::collections::HashMap;

use crate::constants;
use crate::ese::{EseRecord, EseTable};
use crate::value::Value;

/// The three bidirectional views spec.md calls for, kept as plain hash maps
/// rather than a dedicated bimap type — lookups only ever go in one
/// direction at a time and the populate step already knows both keys.
#[derive(Debug, Default, Clone)]
pub struct ClassSchema {
    pub resolve: HashMap<i64, (String, String)>,
    pub ldap: HashMap<String, i64>,
    pub common_name: HashMap<String, i64>,
}

impl ClassSchema {
    fn insert(&mut self, governs_id: i64, common_name: String, ldap_name: String) {
        self.ldap.insert(ldap_name.clone(), governs_id);
        self.common_name.insert(common_name.clone(), governs_id);
        self.resolve.insert(governs_id, (common_name, ldap_name));
    }
}

/// `attribute_schema`: resolves an internal column name to its schema
/// names, plus the `unresolved` bucket for attributes whose backing column
/// couldn't be determined (spec.md §4.1 step 4, ATTRIBUTE_SCHEMA branch).
#[derive(Debug, Default, Clone)]
pub struct AttributeSchema {
    pub resolve: HashMap<String, (String, String)>,
    pub ldap: HashMap<String, String>,
    pub common_name: HashMap<String, String>,
    pub links: HashMap<i64, (String, String)>,
    pub unresolved: HashMap<String, (String, String, String)>,
}

impl AttributeSchema {
    fn insert(&mut self, internal_col: String, common_name: String, ldap_name: String) {
        self.ldap.insert(ldap_name.clone(), internal_col.clone());
        self.common_name.insert(common_name.clone(), internal_col.clone());
        self.resolve.insert(internal_col, (common_name, ldap_name));
    }
}

#[derive(Debug, Default, Clone)]
pub struct SchemaMaps {
    pub object_class_schema: ClassSchema,
    pub attribute_schema: AttributeSchema,
    pub datatable_columns_mapping: HashMap<u32, String>,
}

/// One row of `link_table`: `(peer_DNT, link_base, link_deltime,
/// link_deactivetime, link_data)`.
#[derive(Debug, Clone)]
pub struct LinkEntry {
    pub peer_dnt: i64,
    pub link_base: i64,
    pub link_deltime: Option<i64>,
    pub link_deactivetime: Option<i64>,
    pub link_data: Option<Vec<u8>>,
}

/// Forward/reverse link adjacency, keyed by the DNT string (spec.md §3's
/// "Link entry").
#[derive(Debug, Default, Clone)]
pub struct Links {
    pub to: HashMap<String, Vec<LinkEntry>>,
    pub from: HashMap<String, Vec<LinkEntry>>,
}

/// Raw PEK-blob locations discovered during the bootstrap pass, plus the
/// ADAM/non-ADAM classification. Exactly one of `root_pek_list` /
/// `schema_pek_list` / the DOMAIN_DNS-or-CONFIGURATION blob is populated per
/// spec.md §3's PekList invariant; which slot depends on which branch fired.
#[derive(Debug, Default, Clone)]
pub struct PekSource {
    pub raw_enc_pek_list: Option<Vec<u8>>,
    pub root_pek_list: Option<Vec<u8>>,
    pub schema_pek_list: Option<Vec<u8>>,
    pub is_adam: bool,
}

impl PekSource {
    /// The blob `PekList::load` should actually be fed, in priority order.
    pub fn blob(&self) -> Option<&[u8]> {
        self.raw_enc_pek_list
            .as_deref()
            .or(self.root_pek_list.as_deref())
            .or(self.schema_pek_list.as_deref())
    }
}

/// A snapshot of a `KDS_PROV_ROOT_KEY` record, collected for downstream
/// MS-GKDI work but not further interpreted here (spec.md §9 open question).
/// Keyed and hex-encoded the same way `NtdsCore::serialize_record` renders a
/// record (`original_source/ntds.py` appends `self.serialize_record(record)`,
/// not the raw column dict), using whatever of `attribute_schema.resolve` has
/// been populated by the time this row is reached.
pub type KdsRootKey = HashMap<(String, String), Value>;

/// Renders `record` the way `NtdsCore::serialize_record` does: every column
/// present in `attribute_schema.resolve`, keyed by its `(common_name,
/// ldap_name)` pair, with byte values hex-encoded. Columns absent from the
/// schema are omitted.
pub(crate) fn serialize_record(record: &dyn EseRecord, attribute_schema: &AttributeSchema) -> KdsRootKey {
    let mut out = KdsRootKey::new();
    for (internal_col, value) in record.as_dict() {
        if let Some(names) = attribute_schema.resolve.get(&internal_col) {
            out.insert(names.clone(), value.into_serializable());
        }
    }
    out
}

/// Security descriptors keyed by their `sd_table` id.
pub type SecurityDescriptors = HashMap<String, Vec<u8>>;

/// Parses the leading `ATT<kind>` prefix off an internal column name and
/// returns the trailing decimal digits as a `u32`, per spec.md §4.1 step 1
/// and the §8 property that every bootstrap column name's numeric tail is a
/// valid `datatable_columns_mapping` key.
fn parse_numeric_id(column_name: &str) -> Option<u32> {
    let rest = column_name.strip_prefix("ATT")?;
    let digits_start = rest.find(|c: char| c.is_ascii_digit())?;
    rest[digits_start..].parse().ok()
}

pub struct SchemaResolver;

impl SchemaResolver {
    pub fn build(
        datatable: &dyn EseTable,
        linktable: &dyn EseTable,
        sdtable: &dyn EseTable,
    ) -> (SchemaMaps, Links, SecurityDescriptors, PekSource, Vec<KdsRootKey>) {
        let mut maps = SchemaMaps::default();
        let mut links = Links::default();
        let mut security_descriptors = SecurityDescriptors::new();
        let mut pek_source = PekSource::default();
        let mut kds_root_keys = Vec::new();

        // Step 1: seed datatable_columns_mapping from the column list.
        for column_name in datatable.column_names() {
            if let Some(numeric_id) = parse_numeric_id(&column_name) {
                maps.datatable_columns_mapping.insert(numeric_id, column_name);
            }
        }

        // Step 2: sd_table -> security_descriptors.
        for (i, record) in sdtable.records().enumerate() {
            match Self::read_sd_entry(record.as_ref()) {
                Some((id, value)) => {
                    security_descriptors.insert(id, value);
                }
                None => tracing::warn!(row = i, "sd_table row missing id or value, skipping"),
            }
        }

        // Step 3: link_table -> forward/reverse adjacency.
        for (i, record) in linktable.records().enumerate() {
            match Self::read_link_entry(record.as_ref()) {
                Some((backlink_dnt, to_entry, link_dnt, from_entry)) => {
                    links.to.entry(backlink_dnt.to_string()).or_default().push(to_entry);
                    links.from.entry(link_dnt.to_string()).or_default().push(from_entry);
                }
                None => tracing::warn!(row = i, "link_table row malformed, skipping"),
            }
        }

        // Step 4: walk datatable, dispatching by object class.
        for (i, record) in datatable.records().enumerate() {
            let record = record.as_ref();
            let classes = Self::get_object_class(record);

            if classes.contains(&constants::CLASS_SCHEMA) {
                Self::dispatch_class_schema(record, &mut maps, i);
            } else if classes.contains(&constants::ATTRIBUTE_SCHEMA) {
                Self::dispatch_attribute_schema(record, &mut maps, i);
            } else if classes.contains(&constants::DOMAIN_DNS) {
                if let Some(pek) = record.get(constants::PEK_LIST).and_then(|v| v.as_bytes().map(<[u8]>::to_vec)) {
                    if pek_source.raw_enc_pek_list.is_none() {
                        pek_source.is_adam = false;
                        pek_source.raw_enc_pek_list = Some(pek);
                    }
                }
            } else if classes == [constants::TOP] {
                if let Some(pek) = record.get(constants::PEK_LIST).and_then(|v| v.as_bytes().map(<[u8]>::to_vec)) {
                    pek_source.is_adam = true;
                    pek_source.root_pek_list = Some(pek);
                }
            } else if classes.contains(&constants::DMD) {
                if let Some(pek) = record.get(constants::PEK_LIST).and_then(|v| v.as_bytes().map(<[u8]>::to_vec)) {
                    pek_source.is_adam = true;
                    pek_source.schema_pek_list = Some(pek);
                }
            } else if classes.contains(&constants::CONFIGURATION) {
                if let Some(pek) = record.get(constants::PEK_LIST).and_then(|v| v.as_bytes().map(<[u8]>::to_vec)) {
                    if pek_source.raw_enc_pek_list.is_none() {
                        pek_source.is_adam = true;
                        pek_source.raw_enc_pek_list = Some(pek);
                    }
                }
            } else if classes.contains(&constants::KDS_PROV_ROOT_KEY) {
                kds_root_keys.push(serialize_record(record, &maps.attribute_schema));
            }
        }

        (maps, links, security_descriptors, pek_source, kds_root_keys)
    }

    fn dispatch_class_schema(record: &dyn EseRecord, maps: &mut SchemaMaps, row: usize) {
        let governs_id = record.get(constants::GOVERNS_ID).and_then(|v| v.as_i64());
        let common_name = record.get(constants::ATTRIBUTE_NAME_COMMON_NAME).and_then(|v| v.as_str().map(String::from));
        let ldap_name = record.get(constants::ATTRIBUTE_NAME_LDAP).and_then(|v| v.as_str().map(String::from));

        match (governs_id, common_name, ldap_name) {
            (Some(id), Some(cn), Some(ldap)) => maps.object_class_schema.insert(id, cn, ldap),
            _ => tracing::warn!(row, "CLASS_SCHEMA row missing governs_id/common_name/ldap_name, skipping"),
        }
    }

    fn dispatch_attribute_schema(record: &dyn EseRecord, maps: &mut SchemaMaps, row: usize) {
        let attribute_id = record.get(constants::ATTRIBUTE_ID).and_then(|v| v.as_i64());
        let ms_ds_int_id = record.get(constants::MS_DS_INT_ID).and_then(|v| v.as_i64());
        let common_name = record.get(constants::ATTRIBUTE_NAME_COMMON_NAME).and_then(|v| v.as_str().map(String::from));
        let ldap_name = record.get(constants::ATTRIBUTE_NAME_LDAP).and_then(|v| v.as_str().map(String::from));
        let link_id = record.get(constants::LINK_ID).and_then(|v| v.as_i64());

        let (Some(common_name), Some(ldap_name)) = (common_name, ldap_name) else {
            tracing::warn!(row, "ATTRIBUTE_SCHEMA row missing common_name/ldap_name, skipping");
            return;
        };

        if let Some(link_id) = link_id {
            maps.attribute_schema.links.insert(link_id, (common_name.clone(), ldap_name.clone()));
        }

        // attribute_id/ms_ds_int_id are numeric IDs into datatable_columns_mapping
        // (built in step 1 from the actual column list), not a literal "ATTc{id}"
        // column name — a given attribute's storage column can carry any ATT*
        // prefix depending on its syntax, so the mapping must be consulted rather
        // than synthesized. Prefer attribute_id; else ms_ds_int_id; else unresolved.
        let by_attribute_id = attribute_id.and_then(|id| u32::try_from(id).ok()).and_then(|id| maps.datatable_columns_mapping.get(&id).cloned());
        let by_msds_id = ms_ds_int_id.and_then(|id| u32::try_from(id).ok()).and_then(|id| maps.datatable_columns_mapping.get(&id).cloned());

        match by_attribute_id.or_else(|| by_msds_id.clone()) {
            Some(internal_col) => maps.attribute_schema.insert(internal_col, common_name, ldap_name),
            None => {
                // Neither attribute_id nor ms_ds_int_id resolved to a known
                // column; record the raw numeric IDs so a caller can still see
                // what this row claimed about itself.
                let attr_id_tag = attribute_id.map(|id| id.to_string()).unwrap_or_default();
                let msds_id_tag = ms_ds_int_id.map(|id| id.to_string()).unwrap_or_default();
                maps.attribute_schema.unresolved.insert(ldap_name, (attr_id_tag, msds_id_tag, common_name));
            }
        }
    }

    fn get_object_class(record: &dyn EseRecord) -> Vec<i64> {
        record.get(constants::OBJECT_CLASS).map(|v| v.as_int_list()).unwrap_or_default()
    }

    fn read_sd_entry(record: &dyn EseRecord) -> Option<(String, Vec<u8>)> {
        let id = record.get("sd_id").and_then(|v| v.as_i64()).map(|v| v.to_string())?;
        let value = record.get("sd_value").and_then(|v| v.as_bytes().map(<[u8]>::to_vec))?;
        Some((id, value))
    }

    /// Returns `(backlink_DNT, to_entry, link_DNT, from_entry)`: the `to`
    /// entry's peer is `link_DNT`, the `from` entry's peer is the symmetric
    /// `backlink_DNT` (spec.md §3 "Link entry"; `original_source/ntds.py`
    /// builds `link_info`/`reverse_link_info` as two distinct tuples, not one
    /// tuple shared by both maps).
    fn read_link_entry(record: &dyn EseRecord) -> Option<(i64, LinkEntry, i64, LinkEntry)> {
        let dict: HashMap<String, Value> = record.as_dict().into_iter().collect();
        let link_dnt = dict.get("link_DNT").and_then(|v| v.as_i64())?;
        let backlink_dnt = dict.get("backlink_DNT").and_then(|v| v.as_i64())?;
        let link_base = dict.get("link_base").and_then(|v| v.as_i64()).unwrap_or_default();
        let link_deltime = dict.get("link_deltime").and_then(|v| v.as_i64());
        let link_deactivetime = dict.get("link_deactivetime").and_then(|v| v.as_i64());
        let link_data = dict.get("link_data").and_then(|v| v.as_bytes().map(<[u8]>::to_vec));

        let to_entry = LinkEntry {
            peer_dnt: link_dnt,
            link_base,
            link_deltime,
            link_deactivetime,
            link_data: link_data.clone(),
        };
        let from_entry = LinkEntry { peer_dnt: backlink_dnt, link_base, link_deltime, link_deactivetime, link_data };

        Some((backlink_dnt, to_entry, link_dnt, from_entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    struct FakeRecord(Vec<(String, Value)>);
    impl EseRecord for FakeRecord {
        fn get(&self, column: &str) -> Option<Value> {
            self.0.iter().find(|(name, _)| name == column).map(|(_, v)| v.clone())
        }
        fn as_dict(&self) -> Vec<(String, Value)> {
            self.0.clone()
        }
    }

    struct FakeTable {
        columns: Vec<String>,
        rows: Vec<FakeRecord>,
    }
    impl EseTable for FakeTable {
        fn column_names(&self) -> Vec<String> {
            self.columns.clone()
        }
        fn records(&self) -> Box<dyn Iterator<Item = Box<dyn EseRecord>> + '_> {
            Box::new(self.rows.iter().map(|r| Box::new(FakeRecord(r.0.clone())) as Box<dyn EseRecord>))
        }
    }

    #[test]
    fn bootstrap_resolves_class_attribute_and_pek_location() {
        let datatable = FakeTable {
            columns: vec![constants::GOVERNS_ID.to_string(), "ATTm3".to_string()],
            rows: vec![
                // CLASS_SCHEMA row defining class "user"
                FakeRecord(vec![
                    (constants::OBJECT_CLASS.to_string(), Value::I64(constants::CLASS_SCHEMA)),
                    (constants::GOVERNS_ID.to_string(), Value::I64(655_637)),
                    (constants::ATTRIBUTE_NAME_COMMON_NAME.to_string(), Value::Str("User".to_string())),
                    (constants::ATTRIBUTE_NAME_LDAP.to_string(), Value::Str("user".to_string())),
                ]),
                // ATTRIBUTE_SCHEMA row whose attribute_id matches an existing ATTm column
                FakeRecord(vec![
                    (constants::OBJECT_CLASS.to_string(), Value::I64(constants::ATTRIBUTE_SCHEMA)),
                    (constants::ATTRIBUTE_ID.to_string(), Value::I64(3)),
                    (constants::ATTRIBUTE_NAME_COMMON_NAME.to_string(), Value::Str("Common-Name".to_string())),
                    (constants::ATTRIBUTE_NAME_LDAP.to_string(), Value::Str("cn".to_string())),
                ]),
                // DOMAIN_DNS row carrying a PEK blob
                FakeRecord(vec![
                    (constants::OBJECT_CLASS.to_string(), Value::I64(constants::DOMAIN_DNS)),
                    (constants::PEK_LIST.to_string(), Value::Bytes(vec![1, 2, 3])),
                ]),
            ],
        };
        let linktable = FakeTable { columns: vec![], rows: vec![] };
        let sdtable = FakeTable { columns: vec![], rows: vec![] };

        let (maps, _links, _sds, pek_source, _kds) = SchemaResolver::build(&datatable, &linktable, &sdtable);

        assert_eq!(maps.object_class_schema.resolve.get(&655_637), Some(&("User".to_string(), "user".to_string())));
        assert!(maps.attribute_schema.resolve.contains_key("ATTm3"));
        assert_eq!(pek_source.raw_enc_pek_list, Some(vec![1, 2, 3]));
        assert!(!pek_source.is_adam);
    }

    #[test]
    fn first_domain_dns_pek_hit_wins() {
        let datatable = FakeTable {
            columns: vec![],
            rows: vec![
                FakeRecord(vec![
                    (constants::OBJECT_CLASS.to_string(), Value::I64(constants::DOMAIN_DNS)),
                    (constants::PEK_LIST.to_string(), Value::Bytes(vec![0xAA])),
                ]),
                FakeRecord(vec![
                    (constants::OBJECT_CLASS.to_string(), Value::I64(constants::DOMAIN_DNS)),
                    (constants::PEK_LIST.to_string(), Value::Bytes(vec![0xBB])),
                ]),
            ],
        };
        let linktable = FakeTable { columns: vec![], rows: vec![] };
        let sdtable = FakeTable { columns: vec![], rows: vec![] };

        let (_maps, _links, _sds, pek_source, _kds) = SchemaResolver::build(&datatable, &linktable, &sdtable);
        assert_eq!(pek_source.raw_enc_pek_list, Some(vec![0xAA]));
    }

    #[test]
    fn link_table_adjacency_is_symmetric_not_self_referential() {
        let datatable = FakeTable { columns: vec![], rows: vec![] };
        let linktable = FakeTable {
            columns: vec![],
            rows: vec![FakeRecord(vec![
                ("link_DNT".to_string(), Value::I64(10)),
                ("backlink_DNT".to_string(), Value::I64(20)),
                ("link_base".to_string(), Value::I64(1)),
            ])],
        };
        let sdtable = FakeTable { columns: vec![], rows: vec![] };

        let (_maps, links, _sds, _pek_source, _kds) = SchemaResolver::build(&datatable, &linktable, &sdtable);

        let to_entry = &links.to.get("20").expect("to[backlink_DNT] entry")[0];
        assert_eq!(to_entry.peer_dnt, 10, "to[backlink_DNT]'s peer must be link_DNT");

        let from_entry = &links.from.get("10").expect("from[link_DNT] entry")[0];
        assert_eq!(from_entry.peer_dnt, 20, "from[link_DNT]'s peer must be backlink_DNT, not its own key");
    }

    #[test]
    fn kds_root_key_is_captured_as_a_serialized_record() {
        let datatable = FakeTable {
            columns: vec!["ATTm1".to_string()],
            rows: vec![
                FakeRecord(vec![
                    (constants::OBJECT_CLASS.to_string(), Value::I64(constants::ATTRIBUTE_SCHEMA)),
                    (constants::ATTRIBUTE_ID.to_string(), Value::I64(1)),
                    (constants::ATTRIBUTE_NAME_COMMON_NAME.to_string(), Value::Str("Ms-Kds-Kdf-Algorithm".to_string())),
                    (constants::ATTRIBUTE_NAME_LDAP.to_string(), Value::Str("msKds-KdfAlgorithm".to_string())),
                ]),
                FakeRecord(vec![
                    (constants::OBJECT_CLASS.to_string(), Value::I64(constants::KDS_PROV_ROOT_KEY)),
                    ("ATTm1".to_string(), Value::Bytes(vec![0xDE, 0xAD])),
                ]),
            ],
        };
        let linktable = FakeTable { columns: vec![], rows: vec![] };
        let sdtable = FakeTable { columns: vec![], rows: vec![] };

        let (_maps, _links, _sds, _pek_source, kds_root_keys) = SchemaResolver::build(&datatable, &linktable, &sdtable);

        assert_eq!(kds_root_keys.len(), 1);
        let resolved = &kds_root_keys[0];
        let key = ("Ms-Kds-Kdf-Algorithm".to_string(), "msKds-KdfAlgorithm".to_string());
        assert_eq!(resolved.get(&key), Some(&Value::Str("dead".to_string())), "bytes must be hex-encoded, not raw");
    }
}
