//! Business rules applied to every product before it reaches a sink

use super::model::Product;
use crate::error::ValidationError;

/// Return the first rule `product` breaks, if any
///
/// Rules are checked in order: id, name, price, quantity.
pub fn validate(product: &Product) -> Option<ValidationError> {
    if !product.has_id() {
        return Some(ValidationError::MissingId);
    }
    if !product.has_name() {
        return Some(ValidationError::MissingName);
    }
    if !product.has_valid_price() {
        return Some(ValidationError::InvalidPrice(product.price));
    }
    if !product.has_valid_quantity() {
        return Some(ValidationError::NegativeQuantity(product.quantity));
    }
    None
}
