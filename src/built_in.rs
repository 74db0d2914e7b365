mod env;
mod rules;

pub use self::env::{compiler_env, program_env};
pub use self::rules::{denylist, DENYLIST_JSON};
