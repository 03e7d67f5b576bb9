// Typed partial updates for chart configurations
use super::chart_config::{
    AlignStrategy, ChartConfig, ChartType, Datapoint, Overlay, ProjectionConfig, Range, Tags,
};
use serde::{Deserialize, Deserializer};

/// One field of a patch: absent leaves it alone, `null` clears it, a value replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldPatch<T> {
    #[default]
    Unchanged,
    Set(T),
    Clear,
}

impl<T> FieldPatch<T> {
    fn apply_option(self, current: Option<T>) -> Option<T> {
        match self {
            FieldPatch::Unchanged => current,
            FieldPatch::Set(value) => Some(value),
            FieldPatch::Clear => None,
        }
    }

    fn apply_or_default(self, current: T) -> T
    where
        T: Default,
    {
        match self {
            FieldPatch::Unchanged => current,
            FieldPatch::Set(value) => value,
            FieldPatch::Clear => T::default(),
        }
    }
}

impl<'de, T> Deserialize<'de> for FieldPatch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Only reached when the key is present; missing keys take the Default.
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => FieldPatch::Set(value),
            None => FieldPatch::Clear,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfigPatch {
    #[serde(default, rename = "type")]
    pub chart_type: FieldPatch<ChartType>,
    #[serde(default)]
    pub datapoints: FieldPatch<Vec<Datapoint>>,
    #[serde(default)]
    pub range: FieldPatch<Range>,
    #[serde(default)]
    pub downsample: FieldPatch<String>,
    #[serde(default)]
    pub tags: FieldPatch<Tags>,
    #[serde(default)]
    pub returnset: FieldPatch<String>,
    #[serde(default)]
    pub overlays: FieldPatch<Vec<Overlay>>,
    #[serde(default)]
    pub projections: FieldPatch<Vec<ProjectionConfig>>,
    #[serde(default)]
    pub miny: FieldPatch<f64>,
    #[serde(default)]
    pub maxy: FieldPatch<f64>,
    #[serde(default)]
    pub base: FieldPatch<f64>,
    #[serde(default)]
    pub format: FieldPatch<String>,
    #[serde(default)]
    pub alignment: FieldPatch<AlignStrategy>,
}

impl ChartConfig {
    /// Produce the config that results from applying `patch`; `self` is left untouched.
    pub fn apply(&self, patch: ChartConfigPatch) -> ChartConfig {
        let current = self.clone();
        ChartConfig {
            chart_type: patch.chart_type.apply_or_default(current.chart_type),
            datapoints: patch.datapoints.apply_or_default(current.datapoints),
            range: patch.range.apply_or_default(current.range),
            downsample: patch.downsample.apply_option(current.downsample),
            tags: patch.tags.apply_option(current.tags),
            returnset: patch.returnset.apply_option(current.returnset),
            overlays: patch.overlays.apply_or_default(current.overlays),
            projections: patch.projections.apply_or_default(current.projections),
            miny: patch.miny.apply_option(current.miny),
            maxy: patch.maxy.apply_option(current.maxy),
            base: patch.base.apply_option(current.base),
            format: patch.format.apply_option(current.format),
            alignment: patch.alignment.apply_option(current.alignment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ChartConfig {
        ChartConfig {
            datapoints: vec![Datapoint::metric("m1")],
            downsample: Some("1m-avg".to_string()),
            miny: Some(0.0),
            maxy: Some(100.0),
            format: Some("%d".to_string()),
            ..ChartConfig::default()
        }
    }

    #[test]
    fn test_patch_semantics() {
        let patch: ChartConfigPatch =
            serde_json::from_str(r#"{"downsample": null, "maxy": 50, "type": "bar"}"#).unwrap();
        assert_eq!(patch.downsample, FieldPatch::Clear);
        assert_eq!(patch.maxy, FieldPatch::Set(50.0));
        assert_eq!(patch.miny, FieldPatch::Unchanged);

        let original = base_config();
        let updated = original.apply(patch);

        assert_eq!(updated.downsample, None);
        assert_eq!(updated.maxy, Some(50.0));
        assert_eq!(updated.miny, Some(0.0));
        assert_eq!(updated.chart_type, ChartType::Bar);
        assert_eq!(updated.datapoints, original.datapoints);
        // The source config is a value and is never mutated.
        assert_eq!(original.downsample.as_deref(), Some("1m-avg"));
    }

    #[test]
    fn test_clearing_collections_resets_to_empty() {
        let patch: ChartConfigPatch = serde_json::from_str(r#"{"datapoints": null}"#).unwrap();
        let updated = base_config().apply(patch);
        assert!(updated.datapoints.is_empty());
        assert_eq!(updated.format.as_deref(), Some("%d"));
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let config = base_config();
        assert_eq!(config.apply(ChartConfigPatch::default()), config);
    }
}
