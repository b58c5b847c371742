//! CSV payload parser
//!
//! The header row maps column names onto [`Product`] fields, so columns may
//! come in any order and extra columns are ignored. Parsing is all or
//! nothing: one row with a non-numeric `price` or `quantity` rejects the
//! whole payload.

use csv::{ReaderBuilder, Trim};
use tracing::debug;

use super::model::Product;
use crate::error::ParseError;

/// Parse a complete CSV payload into products, in file order
pub fn parse(data: &[u8]) -> Result<Vec<Product>, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(data);

    let products = reader
        .deserialize::<Product>()
        .collect::<Result<Vec<_>, _>>()?;

    debug!(rows = products.len(), "Parsed product payload");

    Ok(products)
}
