//! Error taxonomy shared by every core component.
//!
//! Library code always returns [`RomError`]; the binary converts it (and
//! anything else) into `anyhow::Error` at the top level, the same boundary
//! this crate draws between its `anyhow::Result` library functions and
//! its `clap`-driven CLI.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RomError>;

#[derive(Debug, Error)]
pub enum RomError {
    #[error("bit offset {offset} (width {width}) is outside the {buffer_len}-byte buffer")]
    OutOfBounds {
        offset: u64,
        width: u64,
        buffer_len: usize,
    },

    #[error("value {value} does not fit in {width}-bit field `{field}`")]
    ValueOverflow {
        field: String,
        value: i128,
        width: u32,
    },

    #[error("byte sequence is not representable in codec `{codec}`: {detail}")]
    InvalidEncoding { codec: String, detail: String },

    #[error("pointer value {value} in table `{table}` falls outside its target span")]
    PointerOutOfRange { table: String, value: u64 },

    #[error("row {row} column `{column}`: {detail}")]
    UnparseableValue {
        row: usize,
        column: String,
        detail: String,
    },

    #[error("schema error: {0}")]
    SchemaError(String),

    #[error("malformed patch: {0}")]
    PatchFormatError(String),

    #[error("patch writes past the end of the image (offset {offset}, image size {image_len})")]
    PatchExpandsRom { offset: u64, image_len: usize },

    #[error("cross-reference `{name}` does not resolve in table `{table}`")]
    UnknownReference { table: String, name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RomError {
    /// During `dump`, value/pointer problems are warnings that still
    /// produce best-effort output. Everything else (and these same
    /// variants during `build`) is fatal.
    pub fn is_dump_warning(&self) -> bool {
        matches!(
            self,
            RomError::ValueOverflow { .. }
                | RomError::PointerOutOfRange { .. }
                | RomError::InvalidEncoding { .. }
        )
    }
}
