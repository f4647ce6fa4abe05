pub mod accounts;
pub mod rpc;

pub use accounts::{MintInfo, TokenAccountInfo};
pub use rpc::{ChainRpc, SimulationOutcome, SolanaRpcClient};
