pub mod builder;
pub mod compute_budget;
pub mod types;

pub use builder::TransactionBuilder;
pub use compute_budget::{
    ComputeBudgetConfig, ComputeBudgetMode, FeeDestination, DEFAULT_COMPUTE_UNIT_BUFFER_PCT,
    MAX_COMPUTE_UNIT_LIMIT,
};
pub use types::{BuildRequest, BuiltTransaction, InstructionSet};
