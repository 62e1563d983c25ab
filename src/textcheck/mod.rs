pub mod types;
pub mod error;
pub mod config;
pub mod change;
pub mod text;
pub mod annotated;
pub mod response;
pub mod scope;
pub mod store;
pub mod reconcile;
pub mod orchestrator;
pub mod interaction;
pub mod session;
pub mod driver;
pub mod wasm;

#[cfg(test)]
mod tests;

pub use types::*;
pub use error::*;
pub use config::*;
pub use change::*;
pub use annotated::*;
pub use response::*;
pub use scope::*;
pub use store::*;
pub use reconcile::*;
pub use orchestrator::*;
pub use interaction::*;
pub use session::*;
pub use driver::*;
pub use wasm::*;
