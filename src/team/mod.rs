//! Team composition: from an assignment to a coordinator plus 2-5 members.

pub mod composer;
pub mod error;
pub mod role_spec;

pub use composer::{Team, TeamComposer};
pub use error::CompositionError;
pub use role_spec::{parse_roles, RoleSpec, MAX_TEAM_SIZE, MIN_TEAM_SIZE};
