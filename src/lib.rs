//! Offline decryption and schema resolution for Active Directory's
//! `ntds.dit`.
//!
//! This crate does not read the ESE database itself — see [`ese`] for the
//! trait boundary a host implements — nor does it install a `tracing`
//! subscriber. It owns exactly the three coupled subsystems that make
//! `ntds.dit` hard to work with: the self-describing schema, the
//! parent-chain DN builder, and the PEK/secret decryption pipeline.

pub mod constants;
mod core;
mod crypto;
mod dn;
mod ese;
mod error;
mod pek;
mod schema;
mod secret;
mod value;

pub use crate::core::{NtdsCore, SerializedRecord, UserRecord};
pub use crate::ese::{EseDatabase, EseRecord, EseTable};
pub use crate::error::{NtdsError, NtdsResult};
pub use crate::pek::PekList;
pub use crate::schema::{AttributeSchema, ClassSchema, KdsRootKey, LinkEntry, Links, PekSource, SchemaMaps, SchemaResolver};
pub use crate::secret::{DecryptedSecret, EncryptedSecret, UnknownAlgorithm};
pub use crate::value::Value;
