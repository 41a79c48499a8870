mod balance;
mod error;
mod expense;
mod friend;
mod money;
mod settlement;
mod summary;

pub use balance::*;
pub use error::*;
pub use expense::*;
pub use friend::*;
pub use money::*;
pub use settlement::*;
pub use summary::*;
