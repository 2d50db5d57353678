#![forbid(unsafe_code)]

mod candidates;
mod engine;
mod history;
mod parse;
mod strategy;

pub use engine::SelfHealingEngine;
pub use history::{DomainHistory, HistoryStore, SelectorRecord};
pub use strategy::{HealingResult, HealingStrategy, SelectorCandidate};
