//! Dataset loading
//!
//! The dataset is one JSON document holding the questionnaire text, the subscale
//! membership sheets and the historical answer matrices:
//!
//! ```json
//! {
//!   "questions": { "EQ": [{"item_number": 1, "text": "..."}], "FLA": [...] },
//!   "subscales": {
//!     "EQ": [{"subscale": "empathy", "items": "1, 3*, 5/7"}, {"subscale": "reverse items", "items": [9]}],
//!     "FLA": [...],
//!     "Strategy": [{"subscale": "memory", "items": [1, 2, 3]}]
//!   },
//!   "history": { "EQ": {"participants": ["p1"], "columns": [1, 3], "rows": [[5, null]]}, ... }
//! }
//! ```
//!
//! Membership lists are number arrays or the sheet notation (comma or slash
//! separated, `*` marks a reverse-coded item). Rows whose name contains a reverse
//! marker list reverse-coded items instead of forming a subscale.

use als_common::history::{HistoricalMatrix, HistorySet};
use als_common::items::{Item, ItemBank, Scale, SubscaleMembership};
use als_common::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Subscale names containing one of these (case-insensitive) list reverse-coded items
const REVERSE_MARKERS: [&str; 2] = ["역코딩", "reverse"];

#[derive(Debug, Deserialize)]
struct RawQuestion {
    item_number: u32,
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawItemList {
    Numbers(Vec<u32>),
    Notation(String),
}

#[derive(Debug, Deserialize)]
struct RawSubscaleRow {
    subscale: String,
    items: RawItemList,
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    #[serde(default)]
    questions: BTreeMap<Scale, Vec<RawQuestion>>,
    #[serde(default)]
    subscales: BTreeMap<Scale, Vec<RawSubscaleRow>>,
    #[serde(default)]
    history: BTreeMap<Scale, HistoricalMatrix>,
}

/// Loaded dataset, immutable after construction
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub bank: ItemBank,
    /// Subscale membership per scale (driver scales list only items with text)
    pub memberships: BTreeMap<Scale, SubscaleMembership>,
    pub history: HistorySet,
}

/// Parse the membership sheet notation (`"1, 3*, 5/7"`) into `(item_number, reverse)`
///
/// Tokens that are not numbers are skipped.
pub fn parse_item_numbers(raw: &str) -> Vec<(u32, bool)> {
    raw.split([',', '/'])
        .filter_map(|token| {
            let token = token.trim();
            if token.is_empty() {
                return None;
            }
            let reverse = token.contains('*');
            let cleaned = token.replace('*', "");
            match cleaned.trim().parse::<u32>() {
                Ok(n) => Some((n, reverse)),
                Err(_) => {
                    debug!(token = token, "Skipping non-numeric membership token");
                    None
                }
            }
        })
        .collect()
}

fn is_reverse_row(name: &str) -> bool {
    let lowered = name.to_lowercase();
    REVERSE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

impl RawItemList {
    fn entries(&self) -> Vec<(u32, bool)> {
        match self {
            RawItemList::Numbers(numbers) => numbers.iter().map(|&n| (n, false)).collect(),
            RawItemList::Notation(raw) => parse_item_numbers(raw),
        }
    }
}

impl Dataset {
    /// Load and assemble the dataset from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!("Dataset file {}", path.display())));
        }
        let content = std::fs::read_to_string(path)?;
        let dataset = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            items = dataset.bank.len(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawDataset = serde_json::from_str(content)?;
        Self::assemble(raw)
    }

    fn assemble(raw: RawDataset) -> Result<Self> {
        for (scale, matrix) in &raw.history {
            matrix
                .validate()
                .map_err(|e| Error::InvalidInput(format!("{} history: {}", scale, e)))?;
        }

        let mut bank = ItemBank::new();
        let mut memberships = BTreeMap::new();

        for scale in Scale::DRIVERS {
            let texts: HashMap<u32, &str> = raw
                .questions
                .get(&scale)
                .into_iter()
                .flatten()
                .map(|q| (q.item_number, q.text.trim()))
                .filter(|(_, text)| !text.is_empty())
                .collect();
            let rows = raw.subscales.get(&scale).map(Vec::as_slice).unwrap_or(&[]);

            let reverse_items: HashSet<u32> = rows
                .iter()
                .filter(|row| is_reverse_row(&row.subscale))
                .flat_map(|row| row.items.entries())
                .map(|(n, _)| n)
                .collect();

            let mut membership = SubscaleMembership::new();
            let mut skipped = 0;
            for row in rows {
                let subscale = row.subscale.trim();
                if subscale.is_empty() || is_reverse_row(subscale) {
                    continue;
                }
                let mut listed = Vec::new();
                for (item_number, starred) in row.items.entries() {
                    let Some(text) = texts.get(&item_number) else {
                        skipped += 1;
                        continue;
                    };
                    bank.insert(Item {
                        scale,
                        item_number,
                        subscale: subscale.to_string(),
                        text: text.to_string(),
                        reverse_coded: starred || reverse_items.contains(&item_number),
                    });
                    listed.push(item_number);
                }
                membership.extend(subscale, listed);
            }

            if skipped > 0 {
                warn!(scale = %scale, skipped = skipped, "Membership items without question text skipped");
            }
            if membership.is_empty() {
                warn!(scale = %scale, "No subscales defined for driver scale");
            }
            memberships.insert(scale, membership);
        }

        let mut strategy = SubscaleMembership::new();
        for row in raw.subscales.get(&Scale::Strategy).into_iter().flatten() {
            let subscale = row.subscale.trim();
            if subscale.is_empty() || is_reverse_row(subscale) {
                continue;
            }
            strategy.extend(subscale, row.items.entries().into_iter().map(|(n, _)| n));
        }
        memberships.insert(Scale::Strategy, strategy);

        Ok(Self {
            bank,
            memberships,
            history: raw.history,
        })
    }
}
