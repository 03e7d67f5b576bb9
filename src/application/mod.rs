// Application layer - Chart use cases over the metric query port
pub mod admission;
pub mod chart_service;
pub mod clock;
pub mod metric_repository;
pub mod projection;
pub mod registry;
pub mod request_builder;
pub mod result_normalizer;
pub mod series_aligner;
