//! Application layer - use-case services over the domain engine.

mod turn_service;

pub use turn_service::TurnService;
