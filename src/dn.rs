//! Builds `dnt_to_dn` from each record's `(RDN, PDNT_col, RDNtyp_col)` via a
//! two-pass fix-point (spec.md §4.2). A single pass isn't enough in general:
//! a child can be visited before its parent, so unresolved children are
//! requeued once all their potential parents have had a chance to resolve.

use std::collections::HashMap;

use crate::ese::{EseRecord, EseTable};
use crate::schema::AttributeSchema;

// Unlike the schema-driven `ATT<kind><id>` attribute columns, these three are
// fixed system columns of `datatable` itself and are addressed by their
// literal names (confirmed against `original_source/ntds.py`, which reads
// `record.get("DNT_col")`/`"PDNT_col"`/`"RDNtyp_col")` directly rather than
// through the `NAME_TO_INTERNAL` schema-name table).
const DNT_COL: &str = "DNT_col";
const PDNT_COL: &str = "PDNT_col";
const RDN_TYP_COL: &str = "RDNtyp_col";

pub struct DnBuilder;

impl DnBuilder {
    pub fn build(datatable: &dyn EseTable, attribute_schema: &AttributeSchema) -> HashMap<String, Vec<String>> {
        let mut dnt_to_dn: HashMap<String, Vec<String>> = HashMap::new();
        let mut pending: Vec<Box<dyn EseRecord>> = Vec::new();

        // Pass one: records whose parent isn't yet known still get an
        // RDN-only entry right away (so siblings resolving later can depend
        // on it becoming available) and are requeued for pass two.
        for record in datatable.records() {
            if let Some((dnt, dn, fully_resolved)) = Self::resolve_one(record.as_ref(), attribute_schema, &dnt_to_dn) {
                dnt_to_dn.insert(dnt, dn);
                if !fully_resolved {
                    pending.push(record);
                }
            }
        }

        // Pass two: the directory forms a shallow forest in practice, so one
        // more pass resolves every parent chain that terminates. Anything
        // still unresolved keeps the RDN-only entry pass one already wrote.
        for record in pending {
            if let Some((dnt, dn, true)) = Self::resolve_one(record.as_ref(), attribute_schema, &dnt_to_dn) {
                dnt_to_dn.insert(dnt, dn);
            }
        }

        dnt_to_dn
    }

    /// Returns `(dnt, dn, fully_resolved)` for applicable records, or `None`
    /// for rows with no RDN/DNT/PDNT at all — a non-null `PDNT_col` is
    /// required, matching `original_source/ntds.py`'s `build_dns` (which only
    /// processes a record when `record.get("PDNT_col")` is truthy) and
    /// spec.md §4.2 pass one's "a non-null `PDNT_col`". `fully_resolved` is
    /// false when the parent DNT wasn't found in `dnt_to_dn` yet — the
    /// returned `dn` is then just the record's own RDN components.
    fn resolve_one(
        record: &dyn EseRecord,
        attribute_schema: &AttributeSchema,
        dnt_to_dn: &HashMap<String, Vec<String>>,
    ) -> Option<(String, Vec<String>, bool)> {
        let rdn = record.get(crate::constants::RDN).and_then(|v| v.as_str().map(String::from))?;
        let dnt = record.get(DNT_COL).and_then(|v| v.as_i64())?;
        let pdnt = record.get(PDNT_COL).and_then(|v| v.as_i64())?;
        let rdn_typ = record.get(RDN_TYP_COL).and_then(|v| v.as_i64());

        let (common_name, ldap_name) = rdn_typ
            .and_then(|typ| attribute_schema.resolve.get(&format!("ATTm{typ}")).cloned())
            .unwrap_or_else(|| ("Common-Name".to_string(), "cn".to_string()));

        let components = vec![
            format!("{}={}", common_name.to_uppercase(), rdn),
            format!("{}={}", ldap_name.to_uppercase(), rdn),
        ];

        match dnt_to_dn.get(&pdnt.to_string()) {
            Some(parent_dn) => {
                let mut dn = components;
                dn.extend(parent_dn.iter().cloned());
                Some((dnt.to_string(), dn, true))
            }
            None => Some((dnt.to_string(), components, false)),
        }
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
    struct FakeTable(Vec<FakeRecord>);
    impl EseTable for FakeTable {
        fn column_names(&self) -> Vec<String> {
            Vec::new()
        }
        fn records(&self) -> Box<dyn Iterator<Item = Box<dyn EseRecord>> + '_> {
            Box::new(self.0.iter().map(|r| Box::new(FakeRecord(r.0.clone())) as Box<dyn EseRecord>))
        }
    }

    fn record(dnt: i64, pdnt: Option<i64>, rdn: &str) -> FakeRecord {
        let mut fields = vec![(DNT_COL.to_string(), Value::I64(dnt)), (crate::constants::RDN.to_string(), Value::Str(rdn.to_string()))];
        if let Some(pdnt) = pdnt {
            fields.push((PDNT_COL.to_string(), Value::I64(pdnt)));
        }
        FakeRecord(fields)
    }

    #[test]
    fn child_visited_before_parent_still_resolves_in_pass_two() {
        // child (dnt=2) appears before its parent (dnt=1) in iteration order.
        // The root's own PDNT (0) never resolves, so it gets an RDN-only
        // entry in pass one — a present PDNT_col is required, but it need not
        // point at a DNT that actually exists.
        let datatable = FakeTable(vec![record(2, Some(1), "child"), record(1, Some(0), "root")]);
        let schema = AttributeSchema::default();

        let dnt_to_dn = DnBuilder::build(&datatable, &schema);

        assert_eq!(dnt_to_dn.get("1"), Some(&vec!["COMMON-NAME=root".to_string(), "CN=root".to_string()]));
        assert_eq!(
            dnt_to_dn.get("2"),
            Some(&vec![
                "COMMON-NAME=child".to_string(),
                "CN=child".to_string(),
                "COMMON-NAME=root".to_string(),
                "CN=root".to_string(),
            ])
        );
    }

    #[test]
    fn unresolved_parent_keeps_rdn_only_entry() {
        let datatable = FakeTable(vec![record(5, Some(999), "orphan")]);
        let schema = AttributeSchema::default();

        let dnt_to_dn = DnBuilder::build(&datatable, &schema);

        assert_eq!(dnt_to_dn.get("5"), Some(&vec!["COMMON-NAME=orphan".to_string(), "CN=orphan".to_string()]));
    }
}
