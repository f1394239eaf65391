// Adapters layer: concrete implementations for external systems (storage, http, delivery).

pub mod delivery;
pub mod http;
pub mod storage;
