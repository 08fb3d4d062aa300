//! Wire messages for the group service.
//!
//! Field names follow the proto3 JSON mapping (camelCase, absent fields take
//! their zero value).

mod group;
mod member;

pub use group::*;
pub use member::*;

use serde::{Deserialize, Serialize};

/// Empty acknowledgement returned by delete operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}
