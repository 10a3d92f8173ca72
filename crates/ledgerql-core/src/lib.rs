pub mod account;
pub mod cache;
pub mod context;
pub mod error;
pub mod expand;
mod resolve;
pub mod rpc;
#[cfg(test)]
pub(crate) mod test_util;
pub mod transaction;
pub mod types;

pub use account::{Account, AccountData, AccountKind, AddressField};
pub use cache::ResolutionCache;
pub use context::{Context, ContextConfig};
pub use error::CoreError;
pub use expand::{ExpandLimits, FieldResult, ResolvedAccount, Selection};
pub use transaction::TransactionResult;
