//! Output writer abstraction layer for tracedash
//!
//! The writer module hands a prepared working table and its summary to a
//! presentation layer. Rendering (charts, widgets, CSV framing) happens on the
//! other side of this boundary.
//!
//! # Example
//!
//! ```rust,ignore
//! use tracedash::writer::{Writer, JsonWriter};
//!
//! let writer = JsonWriter::new();
//! let json = writer.write(&prepared, summary.as_ref())?;
//! println!("{}", json);
//! ```

use crate::pipeline::{Prepared, Summary};
use crate::Result;

mod data;
pub mod json;

pub use data::dataframe_to_values;
pub use json::JsonWriter;

/// Trait for report output writers
pub trait Writer {
    /// Generate output from a prepared selection and its summary
    ///
    /// # Arguments
    ///
    /// * `prepared` - The filtered working table and filter status
    /// * `summary` - Aggregates, absent when the filters left no rows
    ///
    /// # Errors
    ///
    /// Returns `TracedashError::WriterError` if output generation fails.
    fn write(&self, prepared: &Prepared, summary: Option<&Summary>) -> Result<String>;
}
