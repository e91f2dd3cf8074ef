#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package reputation checks run before anything is installed
//!
//! [`Verifier::analyze`] is side-effect free: it looks at the parsed
//! descriptor and whatever metadata the registry returned, and accumulates
//! findings into a [`ValidationResult`]. Whether those findings block the
//! install is decided by [`ValidationResult::is_blocking`] against the
//! configured minimum score.
//!
//! [`ValidationResult`]: e14z_types::ValidationResult
//! [`ValidationResult::is_blocking`]: e14z_types::ValidationResult::is_blocking

mod reputation;
mod scripts;
mod typosquat;
mod verifier;

pub use reputation::ReputationDb;
pub use scripts::ScriptScanner;
pub use typosquat::{edit_method, find_typosquat_target, EditMethod};
pub use verifier::Verifier;
