use crate::error::{Result, TaxonomyError};
use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Tables driving normalization, the classification cascade and the corrective pass.
///
/// Every field has a built-in default; a TOML file only needs the tables it replaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Literal replacements applied before whitespace removal and case folding
    pub substitutions: Vec<Substitution>,

    /// Prefix → category rules shared by the path, identifier and related-id steps
    pub prefix_rules: Vec<PrefixRule>,

    /// Keyword families for the semantic-clue step, in tie-break order
    pub keyword_families: Vec<KeywordFamily>,

    /// Administrative-unit suffixes for the fallback step
    pub location_suffixes: Vec<String>,

    /// Category assigned by the suffix fallback
    pub suffix_category: Category,

    /// Lexical override rules for the corrective pass, first match wins
    pub corrections: Vec<CorrectionRule>,
}

/// A literal `from → to` replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub from: String,
    pub to: String,
}

/// A prefix → category rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRule {
    pub prefix: String,
    pub category: Category,
}

/// Keywords indicating one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordFamily {
    pub category: Category,
    pub keywords: Vec<String>,
}

/// Move terms containing any keyword into `target`, unless excluded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionRule {
    pub target: Category,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn prefix_rules<'a>(category: &str, prefixes: &'a [&str]) -> impl Iterator<Item = PrefixRule> + 'a {
    let category = Category::new(category);
    prefixes.iter().map(move |prefix| PrefixRule {
        prefix: (*prefix).to_string(),
        category: category.clone(),
    })
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let substitutions = [
            ("台", "臺"),
            ("气", "氣"),
            ("风", "風"),
            ("云", "雲"),
            ("雾", "霧"),
            ("温", "溫"),
            ("阵", "陣"),
            ("锋", "鋒"),
            ("冻", "凍"),
            ("区", "區"),
            ("县", "縣"),
            ("乡", "鄉"),
            ("镇", "鎮"),
            ("岛", "島"),
            ("湾", "灣"),
        ]
        .iter()
        .map(|(from, to)| Substitution {
            from: (*from).to_string(),
            to: (*to).to_string(),
        })
        .collect();

        let prefix_rules = prefix_rules(
            Category::GEO_FEATURE,
            &[
                "tw-geo",
                "tw-landform",
                "tw-hydro",
                "tw-volcano",
                "tw-ocean",
                "tw-park",
                "地形地貌",
                "水文環境",
                "火山與地質",
                "海洋與沿岸",
                "國家公園與自然保護區",
                "特殊自然景觀",
            ],
        )
        .chain(prefix_rules(
            Category::CLIMATE,
            &["tw-climate", "氣候", "氣候變遷", "季風", "乾季", "濕季", "氣候災害"],
        ))
        .chain(prefix_rules(
            Category::WEATHER,
            &[
                "tw-weather",
                "天氣",
                "晴朗與雲量變化",
                "降水與雷雨現象",
                "特殊降水與冰雪現象",
                "能見度與空氣現象",
                "極端天氣與災害",
                "鋒面與氣候變化",
                "天氣現象",
            ],
        ))
        .chain(prefix_rules(
            Category::LOCATION,
            &[
                "tw-location",
                "tw-admin",
                "tw-city",
                "tw-county",
                "直轄市",
                "省轄市",
                "縣",
                "縣轄市",
                "區",
                "鄉",
                "鎮",
                "城市",
                "都市區",
                "村",
                "里",
                "行政區",
            ],
        ))
        .collect();

        let keyword_families = vec![
            KeywordFamily {
                category: Category::climate(),
                keywords: strings(&[
                    "氣候", "季風", "乾季", "濕季", "梅雨季", "聖嬰", "climate", "monsoon",
                ]),
            },
            KeywordFamily {
                category: Category::weather(),
                keywords: strings(&[
                    "天氣", "降雨", "降水", "雷雨", "陣雨", "颱風", "鋒面", "冷鋒", "暖鋒", "霧",
                    "霜", "雪", "冰雹", "晴", "weather", "rain", "storm", "typhoon", "fog", "snow",
                ]),
            },
            KeywordFamily {
                category: Category::geo_feature(),
                keywords: strings(&[
                    "地形", "山", "河", "溪", "湖", "海", "島嶼", "火山", "海岸", "盆地", "平原",
                    "高原", "峽谷", "mountain", "river", "lake", "volcano", "coast", "ocean",
                ]),
            },
            KeywordFamily {
                category: Category::location(),
                keywords: strings(&[
                    "城市", "行政區", "都市", "縣", "市", "區", "鄉", "鎮", "村", "city",
                    "county", "district", "township", "village",
                ]),
            },
        ];

        let corrections = vec![CorrectionRule {
            target: Category::weather(),
            keywords: strings(&[
                "冷鋒",
                "暖鋒",
                "滯留鋒",
                "鋒面雨",
                "雷陣雨",
                "短時強降雨",
                "間歇性小雨",
                "霜凍",
                "揚沙",
                "晴朗無雲",
            ]),
            exclusions: strings(&["強降雨事件", "年降雨量", "梅雨季"]),
        }];

        Self {
            substitutions,
            prefix_rules,
            keyword_families,
            location_suffixes: strings(&["市", "區", "鄉", "鎮", "村", "里", "島"]),
            suffix_category: Category::location(),
            corrections,
        }
    }
}

impl ClassifierConfig {
    /// Load a TOML config file; missing tables keep their built-in defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// All categories known to this configuration: the built-in set plus any tag
    /// introduced by a rule.
    #[must_use]
    pub fn categories(&self) -> BTreeSet<Category> {
        let mut out: BTreeSet<Category> = Category::builtin().into_iter().collect();
        out.extend(self.prefix_rules.iter().map(|r| r.category.clone()));
        out.extend(self.keyword_families.iter().map(|f| f.category.clone()));
        out.extend(self.corrections.iter().map(|c| c.target.clone()));
        out.insert(self.suffix_category.clone());
        out
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for sub in &self.substitutions {
            if sub.from.is_empty() {
                return Err(TaxonomyError::invalid_config(
                    "substitution pattern must not be empty",
                ));
            }
            if sub.from.chars().any(char::is_whitespace) {
                return Err(TaxonomyError::invalid_config(format!(
                    "substitution pattern '{}' must not contain whitespace",
                    sub.from
                )));
            }
            if let Some(other) = self
                .substitutions
                .iter()
                .find(|other| sub.to.contains(other.from.as_str()))
            {
                return Err(TaxonomyError::invalid_config(format!(
                    "substitution '{}' -> '{}' produces pattern '{}'",
                    sub.from, sub.to, other.from
                )));
            }
        }

        let mut seen: HashMap<String, &Category> = HashMap::new();
        for rule in &self.prefix_rules {
            let prefix = rule.prefix.to_lowercase();
            if prefix.is_empty() {
                return Err(TaxonomyError::invalid_config("prefix must not be empty"));
            }
            if let Some(existing) = seen.insert(prefix, &rule.category) {
                if existing != &rule.category {
                    return Err(TaxonomyError::invalid_config(format!(
                        "prefix '{}' maps to both '{}' and '{}'",
                        rule.prefix, existing, rule.category
                    )));
                }
            }
        }

        for family in &self.keyword_families {
            if family.keywords.iter().any(String::is_empty) {
                return Err(TaxonomyError::invalid_config(format!(
                    "keyword family '{}' contains an empty keyword",
                    family.category
                )));
            }
        }

        if self.location_suffixes.iter().any(String::is_empty) {
            return Err(TaxonomyError::invalid_config(
                "location suffix must not be empty",
            ));
        }

        for rule in &self.corrections {
            if rule.keywords.is_empty() || rule.keywords.iter().any(String::is_empty) {
                return Err(TaxonomyError::invalid_config(format!(
                    "correction rule for '{}' needs non-empty keywords",
                    rule.target
                )));
            }
        }

        Ok(())
    }
}
