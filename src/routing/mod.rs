//! Route tables: standard and custom-method routes, nesting, and matching.

pub mod action;
pub mod matcher;
pub mod nesting;
pub mod route;

pub use action::{Action, ActionKind, FilterKind, HttpMethod, StandardAction};
pub use matcher::{RouteMatch, RouteMatcher};
pub use nesting::{nest, parent_variable, ChildResource};
pub use route::{build_routes, Lookup, ResourceKind, Route, RouteTable, DEFAULT_LOOKUP_PATTERN};
