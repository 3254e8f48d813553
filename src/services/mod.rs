pub mod aggregator;
pub mod cache;
pub mod dashboard;
pub mod detect;
pub mod excel;
pub mod export;
pub mod filter;
pub mod profiler;
pub mod view;
