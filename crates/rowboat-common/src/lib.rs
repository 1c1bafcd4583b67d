//! Rowboat-Common: Shared types used across the rowboat crates.
//!
//! This crate provides:
//!
//! - **Error Handling**: the unified [`Error`] type and [`Result`] alias
//! - **Policy Enums**: [`FlushMode`], [`NestingMode`], and [`ScopeStrategy`]
//!   governing how session scopes behave
//!
//! # Examples
//!
//! ```
//! use rowboat_common::{Error, FlushMode, Result};
//!
//! fn example() -> Result<()> {
//!     let mode = FlushMode::default();
//!     assert_eq!(mode, FlushMode::Auto);
//!     Err(Error::not_registered("Post"))
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{FlushMode, NestingMode, ScopeStrategy};
