pub mod initiative;
pub mod period;
pub mod seed;

pub use initiative::{
    FIRST_MONTH, Initiative, InitiativeFields, InitiativeId, LAST_MONTH, MAX_PROGRESS,
    ParseEnumError, Priority, Status, Team, ValidationError,
};
pub use period::Period;
pub use seed::starter_initiatives;
