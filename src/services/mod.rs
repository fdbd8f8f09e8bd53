pub mod cache_store;
pub mod object_index;
pub mod sources;
