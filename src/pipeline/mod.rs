//! Request pipeline stages: wildcard authorization, query filters, pagination, validate-only.

pub mod filters;
pub mod pagination;
pub mod validate_only;
pub mod wildcard;

pub use filters::{parse_ordering, FilterInput, FilterStage, ORDERING_PARAM};
pub use pagination::{paginate, PageMeta, PageWindow};
pub use validate_only::{Outcome, Phase, ValidateOnlyContext, ValidateOnlyInterceptor, ValidateOnlyState};
pub use wildcard::{PathVariable, PathVariableConfig, WILDCARD};
