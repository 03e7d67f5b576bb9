// Time-series chart core: request building, normalization, alignment, stats and projections
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
