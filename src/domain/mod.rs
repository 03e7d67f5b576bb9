// Domain layer - Chart data model and pure algorithms
pub mod axis;
pub mod chart_config;
pub mod downsample;
pub mod error;
pub mod patch;
pub mod plot;
pub mod printf;
pub mod query_result;
pub mod regression;
pub mod request;
pub mod stats;
pub mod time_spec;
pub mod units;
