pub mod api;
pub mod chain_client;
pub mod config;
pub mod cursor;
pub mod governor;
pub mod listing;
pub mod periodic_scan;
pub mod proposal;
pub mod scanner;
pub mod store;
pub mod test_utils;

pub const DEFAULT_WINDOW_SIZE: u64 = 5000; // Blocks per eth_getLogs request
pub const DEFAULT_MIN_BLOCK: u64 = 21_041_027; // Governor deployment block
pub const DEFAULT_PAGE_SIZE: usize = 5;
