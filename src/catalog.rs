// src/catalog.rs

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

use crate::error::AnalysisError;

/// Human-readable name → file identifier, as shipped.
static DEFAULT_INSTRUMENTS: &[(&str, &str)] = &[
    ("aud 4y bond", "AUD_bond_4Y"),
    ("aud 10y bond", "AUD_bond_10Y"),
    ("audcad", "AUDCAD"),
    ("audchf", "AUDCHF"),
    ("audjpy", "AUDJPY"),
    ("audusd", "AUDUSD"),
    ("brent oil", "Brent Oil"),
    ("cad 2y bond", "CAD_bond_2Y"),
    ("cad 3y bond", "CAD_bond_3Y"),
    ("cad 4y bond", "CAD_bond_4Y"),
    ("cad 5y bond", "CAD_bond_5Y"),
    ("cad 7y bond", "CAD_bond_7Y"),
    ("cad 10y bond", "CAD_bond_10Y"),
    ("cadchf", "CADCHF"),
    ("cadjpy", "CADJPY"),
    ("chfjpy", "CHFJPY"),
    ("copper", "Copper"),
    ("crb", "CRB"),
    ("euraud", "EURAUD"),
    ("eurcad", "EURCAD"),
    ("eurgbp", "EURGBP"),
    ("eurjpy", "EURJPY"),
    ("eurusd", "EURUSD"),
    ("eurnzd", "EURNZD"),
    ("france 10y bond", "France 10-Year_Bond"),
    ("gbp 1m bond", "GBP_bond_1M"),
    ("gbp 3y bond", "GBP_bond_3Y"),
    ("gbp 6m bond", "GBP_bond_6M"),
    ("gbpchf", "GBPCHF"),
    ("gbpjpy", "GBPJPY"),
    ("gbpusd", "GBPUSD"),
    ("gbpnzd", "GBPNZD"),
    ("gbpcad", "GBPCAD"),
    ("germany 5y bond", "Germany 5-Year_Bond"),
    ("germany 10y bond", "Germany 10-Year_Bond"),
    ("gold", "Gold"),
    ("heating oil", "Heating Oil"),
    ("jpy 8y bond", "JPY_bond_8Y"),
    ("jpy 10y bond", "JPY_bond_10Y"),
    ("jpy 30y bond", "JPY_bond_30Y"),
    ("lumber", "Lumber"),
    ("nzd 6m bond", "NZD_bond_6M"),
    ("nasdaq", "NASDAQ"),
    ("natural gas", "Natural Gas"),
    ("nzdusd", "NZDUSD"),
    ("silver", "Silver"),
    ("t-note", "T-Note"),
    ("us 30 cash", "US 30 Cash"),
    ("usd index", "US Dollar Index"),
    ("us wheat", "US Wheat"),
    ("usd 2y bond", "USD_bond_2Y"),
    ("usd 5y bond", "USD_bond_5Y"),
    ("usd 10y bond", "USD_bond_10Y"),
    ("usdcad", "USDCAD"),
    ("usdchf", "USDCHF"),
    ("usdjpy", "USDJPY"),
    ("vix", "VIX"),
];

/// Currency code → instruments used to model that currency.
static DEFAULT_FEATURE_SETS: &[(&str, &[&str])] = &[
    (
        "USD",
        &[
            "USD_bond_2Y", "USD_bond_5Y", "USD_bond_10Y", "EURUSD", "NZDUSD", "GBPUSD", "USDCHF",
            "NASDAQ", "VIX", "T-Note", "US 30 Cash", "Silver", "Gold", "Copper", "CRB",
        ],
    ),
    (
        "CAD",
        &[
            "CAD_bond_7Y", "CAD_bond_5Y", "CAD_bond_4Y", "CAD_bond_3Y", "CAD_bond_2Y",
            "CAD_bond_10Y", "CADCHF", "GBPCAD", "CADJPY", "EURCAD", "VIX", "T-Note", "US Wheat",
            "Heating Oil", "CRB",
        ],
    ),
    (
        "AUD",
        &[
            "AUD_bond_10Y", "AUD_bond_4Y", "AUDCHF", "AUDJPY", "AUDCAD", "VIX", "NASDAQ",
            "USD_bond_10Y", "Lumber", "Brent Oil", "Copper", "CRB",
        ],
    ),
    (
        "NZD",
        &[
            "NZD_bond_6M", "VIX", "NASDAQ", "Silver", "Brent Oil", "Copper", "EURNZD", "NZDUSD",
            "GBPNZD",
        ],
    ),
    (
        "JPY",
        &[
            "JPY_bond_8Y", "JPY_bond_10Y", "JPY_bond_30Y", "EURJPY", "GBPJPY", "CADJPY", "VIX",
            "NASDAQ", "Heating Oil", "US Dollar Index",
        ],
    ),
    (
        "GBP",
        &[
            "GBP_bond_3Y", "GBP_bond_1M", "GBP_bond_6M", "GBPUSD", "GBPJPY", "GBPCHF", "EURGBP",
            "Heating Oil",
        ],
    ),
    (
        "EUR",
        &[
            "Germany 10-Year_Bond", "Germany 5-Year_Bond", "France 10-Year_Bond",
            "US Dollar Index", "EURGBP", "EURUSD", "EURJPY", "EURCAD", "NASDAQ", "Brent Oil",
            "Silver", "CRB", "Natural Gas",
        ],
    ),
];

static BUILTIN: Lazy<Catalog> = Lazy::new(|| Catalog {
    instruments: DEFAULT_INSTRUMENTS
        .iter()
        .map(|(name, id)| (name.to_string(), id.to_string()))
        .collect(),
    feature_sets: DEFAULT_FEATURE_SETS
        .iter()
        .map(|(code, ids)| (code.to_string(), ids.iter().map(|s| s.to_string()).collect()))
        .collect(),
});

/// Immutable instrument registry: display names, file identifiers and
/// per-currency feature sets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Lower-case display name → file identifier.
    pub instruments: BTreeMap<String, String>,
    /// Currency code → ordered instrument identifiers.
    #[serde(default)]
    pub feature_sets: BTreeMap<String, Vec<String>>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    /// Load a catalog from YAML. Display names are folded to lower case and
    /// currency codes to upper case.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading catalog {:?}", path.as_ref()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing catalog {:?}", path.as_ref()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let mut catalog: Catalog = serde_yaml::from_str(text)?;
        catalog.instruments = catalog
            .instruments
            .into_iter()
            .map(|(name, id)| (name.trim().to_lowercase(), id))
            .collect();
        catalog.feature_sets = catalog
            .feature_sets
            .into_iter()
            .map(|(code, ids)| (code.trim().to_uppercase(), ids))
            .collect();
        Ok(catalog)
    }

    /// Map a display name (any case) to its identifier.
    pub fn resolve(&self, name: &str) -> Result<&str, AnalysisError> {
        self.instruments
            .get(&name.trim().to_lowercase())
            .map(String::as_str)
            .ok_or_else(|| AnalysisError::MissingInstrument(name.trim().to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(String::as_str)
    }

    /// Instruments used to model `code` (e.g. `"USD"`).
    pub fn feature_set(&self, code: &str) -> Result<&[String], AnalysisError> {
        self.feature_sets
            .get(&code.trim().to_uppercase())
            .map(Vec::as_slice)
            .ok_or_else(|| AnalysisError::UnknownFeatureSet(code.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_resolves_case_insensitively() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.resolve("USD Index").unwrap(), "US Dollar Index");
        assert_eq!(catalog.resolve(" us wheat ").unwrap(), "US Wheat");
        assert_eq!(
            catalog.resolve("dogecoin").unwrap_err(),
            AnalysisError::MissingInstrument("dogecoin".into())
        );
    }

    #[test]
    fn test_builtin_feature_sets() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.feature_sets.len(), 7);
        let usd = catalog.feature_set("usd").unwrap();
        assert_eq!(usd.first().map(String::as_str), Some("USD_bond_2Y"));
        assert_eq!(usd.len(), 15);
        assert!(matches!(
            catalog.feature_set("SEK"),
            Err(AnalysisError::UnknownFeatureSet(_))
        ));
    }

    #[test]
    fn test_feature_set_members_are_known_identifiers() {
        let catalog = Catalog::builtin();
        let ids: Vec<&String> = catalog.instruments.values().collect();
        for members in catalog.feature_sets.values() {
            for id in members {
                assert!(ids.contains(&id), "{} missing from instruments", id);
            }
        }
    }

    #[test]
    fn test_yaml_catalog() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(
            tmp,
            "instruments:\n  Gold: Gold\n  Silver Spot: Silver\nfeature_sets:\n  XAU: [Gold, Silver]"
        )?;
        let catalog = Catalog::from_yaml_file(tmp.path())?;
        assert_eq!(catalog.resolve("silver spot")?, "Silver");
        assert_eq!(catalog.feature_set("xau")?, &["Gold".to_string(), "Silver".to_string()]);
        Ok(())
    }

    #[test]
    fn test_yaml_currency_codes_any_case() -> Result<()> {
        let catalog = Catalog::from_yaml_str(
            "instruments:\n  gold: Gold\nfeature_sets:\n  xau: [Gold]\n  Xag: [Silver]\n",
        )?;
        assert_eq!(catalog.feature_set("XAU")?, &["Gold".to_string()]);
        assert_eq!(catalog.feature_set("xau")?, &["Gold".to_string()]);
        assert_eq!(catalog.feature_set("xag")?, &["Silver".to_string()]);
        Ok(())
    }
}
