pub mod backup;
pub mod config;
pub mod consolidate;
pub mod diff;
pub mod error;
pub mod io;
pub mod logging;
pub mod model;
pub mod recovery;
pub mod reference;
pub mod split;
pub mod sync;
pub mod validate;
pub mod watch;

pub use error::{Result, TokenError};
