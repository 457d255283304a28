//env
pub const ETHEREUM_NODE_URL_NOT_SET: &str = "ETHEREUM_NODE_URL not set!";
pub const SCANNER_GOVERNORS_NOT_SET: &str = "SCANNER_GOVERNORS not set and no governors configured!";

//rpc
pub const RPC_PROVIDER_FAILED: &str = "Failed to create RPC provider";
pub const FETCH_BLOCK_NUMBER_FAILED: &str = "Failed to fetch current block number";
pub const FETCH_BLOCK_FAILED: &str = "Failed to fetch block";
pub const FETCH_LOGS_FAILED: &str = "Failed to fetch logs";

//store
pub const STATE_LOAD_FAILED: &str = "Failed to load scan state";

//scanner
pub const SCAN_FAILED: &str = "Scan failed";
pub const INVALID_GOVERNOR_ADDRESS: &str = "Please enter a valid Ethereum address";
