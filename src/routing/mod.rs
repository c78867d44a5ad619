//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (exact lookup by pattern, ALL fallback)
//!     → router.rs (parameterized scan in registration order)
//!     → matcher.rs (segment-wise match, `:name` bindings)
//!     → Return: RouteMatch or None
//!
//! Route Mutation (at startup and on file events):
//!     RouteLoader
//!     → insert / remove_by_origin / replace_origin
//!     → publish new immutable snapshot
//! ```
//!
//! # Design Decisions
//! - Table is mutable at runtime, readers never lock
//! - Literal routes resolve before parameterized ones
//! - Deterministic: same table and input always match the same route
//! - No specificity ranking: first registered parameterized route wins

pub mod matcher;
pub mod router;

pub use matcher::{match_path, PathParams};
pub use router::{MethodFilter, RouteEntry, RouteKey, RouteMatch, RouteOrigin, RouteTable};
