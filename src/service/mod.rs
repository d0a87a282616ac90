//! CrudService and RequestValidator over the store.

mod crud;
mod validation;
pub use crud::CrudService;
pub use validation::{RequestValidator, WriteMode, WriteRequest};
