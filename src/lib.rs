//! Convoflow - Conversational Flow Engine
//!
//! This crate drives multi-turn, natural-language conversations that collect
//! a sequence of required parameters for an intent and trigger a terminal
//! business action once the set is complete.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
