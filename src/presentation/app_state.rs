// Application state for HTTP handlers
use crate::application::chart_service::ChartRenderer;
use crate::application::registry::ChartRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: ChartRegistry,
    /// Renders ad-hoc configs that are not stored in the registry.
    pub renderer: ChartRenderer,
}
