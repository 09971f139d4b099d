//! Trait boundary onto the ESE (Extensible Storage Engine) database.
//!
//! Reading `ntds.dit`'s B-tree and page layout is out of scope for this
//! crate — it's provided by a host that hands us an implementation of
//! [`EseDatabase`]. Everything downstream (schema resolution, DN building,
//! secret decryption) is written against these three traits only.

use crate::value::Value;

/// A single row from `datatable`, `link_table` or `sd_table`.
pub trait EseRecord {
    /// Looks up a column by its internal name (e.g. `"ATTm589825"`).
    fn get(&self, column: &str) -> Option<Value>;

    /// Every column present on this record, along with its value.
    fn as_dict(&self) -> Vec<(String, Value)>;
}

/// One of the three named tables this crate depends on.
pub trait EseTable {
    /// The internal names of every column in the table.
    fn column_names(&self) -> Vec<String>;

    /// Iterates the table's rows in storage order.
    fn records(&self) -> Box<dyn Iterator<Item = Box<dyn EseRecord>> + '_>;
}

/// The database handle supplied by the host.
pub trait EseDatabase {
    fn table(&self, name: &str) -> Option<&dyn EseTable>;
}
