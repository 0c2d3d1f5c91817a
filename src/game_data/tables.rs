//! Typed views of the exported game tables.
//!
//! Only the fields the recognizer needs are modelled; everything else in the
//! JSON is ignored.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Text ids appear as both numbers and strings in the exports.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum TextId {
    Number(i64),
    Text(String),
}

impl fmt::Display for TextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextId::Number(n) => write!(f, "{}", n),
            TextId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A localizable string: an id into the I18n tables plus the source-language text.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TranslationKey {
    pub id: TextId,
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gem {
    pub gem_term_id: String,
    /// 0 = attribute, 1 = secondary, 2 = skill
    pub term_type: i32,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub tag_name: Option<TranslationKey>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillPatch {
    pub tag_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SkillPatchBundle {
    #[serde(rename = "SkillPatchDataBundle")]
    pub patches: Vec<SkillPatch>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponBasic {
    pub weapon_id: String,
    #[serde(default)]
    pub weapon_skill_list: Vec<String>,
    #[serde(default)]
    pub rarity: i32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: TranslationKey,
    #[serde(default)]
    pub rarity: i32,
}

pub type GemTable = HashMap<String, Gem>;
/// Skill tag id -> key into [`GemTable`]
pub type GemTagIdTable = HashMap<String, String>;
pub type SkillPatchTable = HashMap<String, SkillPatchBundle>;
pub type WeaponBasicTable = HashMap<String, WeaponBasic>;
pub type ItemTable = HashMap<String, Item>;
/// Text id -> translated text
pub type I18nTextTable = HashMap<String, String>;

/// File name of the translation table for a language code such as `"CN"`.
pub fn i18n_table_file_name(language: &str) -> String {
    format!("I18nTextTable_{}.json", language)
}

/// Reads and deserializes one table file.
pub fn load_table<T: DeserializeOwned>(dir: &Path, file_name: &str) -> Result<T> {
    let path = dir.join(file_name);
    let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("parse {}", path.display()))
}

/// All tables needed to derive weapon stats and item names.
pub struct RawTables {
    pub gems: GemTable,
    pub gem_tags: GemTagIdTable,
    pub skill_patches: SkillPatchTable,
    pub weapons: WeaponBasicTable,
    pub items: ItemTable,
    pub texts: I18nTextTable,
}

impl RawTables {
    pub fn load(dir: &Path, language: &str) -> Result<Self> {
        Ok(Self {
            gems: load_table(dir, "GemTable.json")?,
            gem_tags: load_table(dir, "GemTagIdTable.json")?,
            skill_patches: load_table(dir, "SkillPatchTable.json")?,
            weapons: load_table(dir, "WeaponBasicTable.json")?,
            items: load_table(dir, "ItemTable.json")?,
            texts: load_table(dir, &i18n_table_file_name(language))?,
        })
    }
}
