pub mod base;
pub mod system_metric;
// statistic preparation slots, statistic slots
pub mod stat;
// statistic slots, rule check slots
pub mod circuitbreaker;
pub mod config;
pub mod flow;
// rule check slots
pub mod authority;
pub mod system;
