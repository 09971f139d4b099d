use thiserror::Error;

/// Result alias used throughout the crate.
pub type NtdsResult<T> = std::result::Result<T, NtdsError>;

/// Construction-time failures. Per spec.md §7, a missing boot key/PEK blob
/// or an out-of-range PEK index are *not* construction-time failures — they
/// leave `pek_list` empty or produce a `DEC_ERROR_*`/`MISSING_RID_*`
/// sentinel from `decrypt_secret`, never a `Result::Err`. Per-row parse
/// failures are likewise logged and skipped rather than represented here.
/// The only fatal failure left is the database itself being unopenable.
#[derive(Error, Debug)]
pub enum NtdsError {
    #[error("the datatable, link_table or sd_table could not be opened: {0}")]
    Ese(String),
}
