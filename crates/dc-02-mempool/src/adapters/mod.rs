//! Adapters layer

mod store;

pub use store::InMemoryMempoolStore;
