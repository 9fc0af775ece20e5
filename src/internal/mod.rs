//! Internal Implementation Details
//!
//! This module contains implementation details that are not part of the public API.
//!
//! # Contents
//!
//! - [`volatile`]: Raw volatile register access
//! - [`cell`]: Critical-section protected cell for process-wide state
//!
//! # Stability
//!
//! **WARNING:** This module is `pub(crate)` only. Do not depend on any types
//! or functions in this module from external code.

pub(crate) mod cell;
pub(crate) mod volatile;
