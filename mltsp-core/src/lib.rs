//! MLTSP Core - Record Types
//!
//! Pure data structures shared by every other crate: the six stored record
//! kinds, the enums that name collections and job stages, and the error
//! taxonomy. No persistence and no business logic live here.

mod entities;
mod enums;
mod error;
mod identity;
mod record;

pub use entities::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
pub use record::*;
