//! Pooled-capital vault with share accounting, time-released profit,
//! and automated leverage management over simulated lending markets.

pub mod cli;
pub mod engine;
pub mod error;
pub mod example;
pub mod market;
pub mod model;
pub mod scenario_run;
pub mod schema;
pub mod strategy;
