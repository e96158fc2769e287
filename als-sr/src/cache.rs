//! Selection cache artifact
//!
//! Short-form selection runs once; its payload is written as pretty JSON and reused
//! on later startups unless a rebuild is requested.

use als_common::config::EngineParams;
use als_common::selection::{ItemSelectionEngine, SelectionPayload, SelectionResult};
use als_common::Result;
use std::path::Path;
use tracing::{info, warn};

use crate::dataset::Dataset;

/// Read a cached selection, checking every item against the bank
///
/// Returns `Ok(None)` when no cache file exists.
pub fn load_selection(path: &Path, dataset: &Dataset) -> Result<Option<SelectionResult>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let payload: SelectionPayload = serde_json::from_str(&content)?;
    SelectionResult::from_payload(payload, &dataset.bank).map(Some)
}

/// Write the selection payload, creating parent directories
pub fn save_selection(path: &Path, selection: &SelectionResult) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&selection.to_payload())?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Use the cache when present (and not bypassed), otherwise select and cache
pub fn load_or_build(
    path: &Path,
    dataset: &Dataset,
    params: &EngineParams,
    rebuild: bool,
) -> Result<SelectionResult> {
    if !rebuild {
        if let Some(selection) = load_selection(path, dataset)? {
            info!(path = %path.display(), "Selection cache hit");
            return Ok(selection);
        }
        info!(path = %path.display(), "Selection cache miss; building short forms");
    } else {
        info!("Rebuilding short forms (cache bypassed)");
    }

    let selection = ItemSelectionEngine::new(&dataset.bank, &dataset.history, params).build();
    if let Err(e) = save_selection(path, &selection) {
        warn!(path = %path.display(), error = %e, "Could not write selection cache");
    }
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use als_common::items::Scale;

    fn dataset() -> Dataset {
        Dataset::from_json(
            r#"{
                "questions": {
                    "EQ": [
                        {"item_number": 1, "text": "I notice how friends feel"},
                        {"item_number": 2, "text": "I plan my study week"}
                    ],
                    "FLA": [
                        {"item_number": 1, "text": "I panic when I speak"},
                        {"item_number": 2, "text": "grammar tests frighten me"}
                    ]
                },
                "subscales": {
                    "EQ": [{"subscale": "empathy", "items": [1, 2]}],
                    "FLA": [{"subscale": "fear", "items": [1, 2]}]
                }
            }"#,
        )
        .unwrap()
    }

    fn params() -> EngineParams {
        EngineParams {
            eq_target: 1,
            fla_target: 1,
            ..EngineParams::default()
        }
    }

    #[test]
    fn test_missing_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_selection(&dir.path().join("none.json"), &dataset()).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_build_writes_cache_then_reuses_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cache").join("item_builder_results.json");
        let dataset = dataset();

        let built = load_or_build(&path, &dataset, &params(), false).unwrap();
        assert!(path.exists());
        assert_eq!(built.selected(Scale::Eq).len(), 1);

        // A larger target would change a fresh build; the cache keeps the old one
        let bigger = EngineParams {
            eq_target: 2,
            ..params()
        };
        let cached = load_or_build(&path, &dataset, &bigger, false).unwrap();
        assert_eq!(cached.selected(Scale::Eq), built.selected(Scale::Eq));

        let rebuilt = load_or_build(&path, &dataset, &bigger, true).unwrap();
        assert_eq!(rebuilt.selected(Scale::Eq).len(), 2);
    }

    #[test]
    fn test_cache_with_unknown_items_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{
                "selected_questions": {"EQ": [{"question_id": "EQ-9", "scale": "EQ", "item_number": 9, "subscale": "x", "text": "t"}]},
                "removed_by_subscale": {},
                "alpha_report": {}
            }"#,
        )
        .unwrap();
        assert!(load_selection(&path, &dataset()).is_err());
    }
}
