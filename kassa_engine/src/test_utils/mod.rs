//! Helpers for integration tests: throwaway SQLite databases and stub rate providers.
pub mod prepare_env;
pub mod stubs;
