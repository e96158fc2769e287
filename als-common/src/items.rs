//! Item bank data model
//!
//! Items are identified by `(scale, item_number)` and rendered as `"{scale}-{item_number}"`
//! (e.g. `EQ-7`). Everything here is immutable once the dataset has been loaded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Questionnaire scale
///
/// `Eq` (behavioral trait) and `Fla` (anxiety trait) are the driver scales whose
/// items are reduced into the short form. `Strategy` only carries scoring columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scale {
    #[serde(rename = "EQ")]
    Eq,
    #[serde(rename = "FLA", alias = "Anxiety")]
    Fla,
    #[serde(rename = "Strategy")]
    Strategy,
}

impl Scale {
    /// Driver scales, in comparison order (EQ wins exact ties)
    pub const DRIVERS: [Scale; 2] = [Scale::Eq, Scale::Fla];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::Eq => "EQ",
            Scale::Fla => "FLA",
            Scale::Strategy => "Strategy",
        }
    }

    pub fn is_driver(&self) -> bool {
        matches!(self, Scale::Eq | Scale::Fla)
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scale {
    type Err = Error;

    /// Accepts the sheet names used by the source questionnaires
    /// ("Anxiety" is an alias for FLA).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" => Ok(Scale::Eq),
            "fla" | "anxiety" => Ok(Scale::Fla),
            "strategy" => Ok(Scale::Strategy),
            other => Err(Error::InvalidInput(format!("Unknown scale: {}", other))),
        }
    }
}

/// Build the public question id for an item
pub fn item_id(scale: Scale, item_number: u32) -> String {
    format!("{}-{}", scale, item_number)
}

/// Likert response bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LikertRange {
    pub min: f64,
    pub max: f64,
}

impl LikertRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Flip a raw value for a negatively phrased item (`max + min - v`)
    pub fn reverse(&self, value: f64) -> f64 {
        self.max + self.min - value
    }

    /// Score a raw value, reverse-coding when required
    pub fn score(&self, value: f64, reverse_coded: bool) -> f64 {
        if reverse_coded {
            self.reverse(value)
        } else {
            value
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn half_span(&self) -> f64 {
        (self.max - self.min) / 2.0
    }
}

impl Default for LikertRange {
    fn default() -> Self {
        Self::new(1.0, 5.0)
    }
}

/// Questionnaire item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub scale: Scale,
    pub item_number: u32,
    pub subscale: String,
    pub text: String,
    #[serde(default)]
    pub reverse_coded: bool,
}

impl Item {
    pub fn question_id(&self) -> String {
        item_id(self.scale, self.item_number)
    }
}

/// Items sharing `(scale, subscale)`, in first-encountered order
#[derive(Debug, Clone, PartialEq)]
pub struct SubscaleGroup {
    pub subscale: String,
    pub items: Vec<Item>,
}

/// All loaded items, keyed by question id, preserving load order
#[derive(Debug, Clone, Default)]
pub struct ItemBank {
    items: Vec<Item>,
    index: HashMap<String, usize>,
}

impl ItemBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item; the first occurrence of an id wins.
    ///
    /// Returns `false` when the id was already present.
    pub fn insert(&mut self, item: Item) -> bool {
        let id = item.question_id();
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id, self.items.len());
        self.items.push(item);
        true
    }

    pub fn get(&self, question_id: &str) -> Option<&Item> {
        self.index.get(question_id).map(|&i| &self.items[i])
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.index.contains_key(question_id)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn scale_items(&self, scale: Scale) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(move |item| item.scale == scale)
    }

    /// Group a scale's items by subscale, keeping first-encountered subscale order
    pub fn groups(&self, scale: Scale) -> Vec<SubscaleGroup> {
        let mut groups: Vec<SubscaleGroup> = Vec::new();
        for item in self.scale_items(scale) {
            match groups.iter_mut().find(|g| g.subscale == item.subscale) {
                Some(group) => group.items.push(item.clone()),
                None => groups.push(SubscaleGroup {
                    subscale: item.subscale.clone(),
                    items: vec![item.clone()],
                }),
            }
        }
        groups
    }
}

impl FromIterator<Item> for ItemBank {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        let mut bank = ItemBank::new();
        for item in iter {
            bank.insert(item);
        }
        bank
    }
}

/// Ordered subscale → item-number membership for one scale
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscaleMembership {
    entries: Vec<(String, Vec<u32>)>,
}

impl SubscaleMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscale (if new) and append item numbers not already listed
    pub fn extend(&mut self, subscale: &str, item_numbers: impl IntoIterator<Item = u32>) {
        let position = match self.entries.iter().position(|(name, _)| name == subscale) {
            Some(pos) => pos,
            None => {
                self.entries.push((subscale.to_string(), Vec::new()));
                self.entries.len() - 1
            }
        };
        let numbers = &mut self.entries[position].1;
        for n in item_numbers {
            if !numbers.contains(&n) {
                numbers.push(n);
            }
        }
    }

    pub fn get(&self, subscale: &str) -> Option<&[u32]> {
        self.entries
            .iter()
            .find(|(name, _)| name == subscale)
            .map(|(_, numbers)| numbers.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u32])> {
        self.entries
            .iter()
            .map(|(name, numbers)| (name.as_str(), numbers.as_slice()))
    }

    pub fn subscales(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
