//! Derivation script adapters.

mod rhai_engine;

pub use rhai_engine::RhaiScriptEngine;
