use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    env,
};
use thiserror::Error;

pub const ADDRESS_ONLY_ENV: &str = "RESULT_PLAN_ADDRESS_ONLY";
pub const TRIVIAL_ENV: &str = "RESULT_PLAN_TRIVIAL";

const DEFAULT_TRIVIAL: &[&str] = &[
    "Int", "Int8", "Int16", "Int32", "Int64", "UInt", "UInt8", "UInt16", "UInt32", "UInt64",
    "Bool", "Float", "Double",
];

const DEFAULT_BRIDGED: &[(&str, &str)] = &[
    ("Bool", "ObjCBool"),
    ("String", "NSString"),
    ("Array", "NSArray"),
];

/// Knobs the type converter consults when deciding how a nominal type is laid out.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoweringOptions {
    /// Nominal types whose layout is unknown at this point, e.g. resilient types from
    /// another module. Values of these types always live in memory.
    pub address_only: BTreeSet<String>,
    pub trivial: BTreeSet<String>,
    /// Native nominal name to the foreign type it crosses a foreign boundary as.
    pub bridged: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("invalid lowering options: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("type `{name}` cannot be both trivial and address-only")]
    Conflict { name: String },
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            address_only: BTreeSet::new(),
            trivial: DEFAULT_TRIVIAL.iter().map(|name| name.to_string()).collect(),
            bridged: DEFAULT_BRIDGED
                .iter()
                .map(|(native, foreign)| (native.to_string(), foreign.to_string()))
                .collect(),
        }
    }
}

impl LoweringOptions {
    pub fn from_toml_str(source: &str) -> Result<Self, OptionsError> {
        let options: LoweringOptions = toml::from_str(source)?;
        options.validate()
    }

    pub fn validate(self) -> Result<Self, OptionsError> {
        if let Some(name) = self.address_only.intersection(&self.trivial).next() {
            return Err(OptionsError::Conflict { name: name.clone() });
        }
        Ok(self)
    }

    /// Applies `RESULT_PLAN_ADDRESS_ONLY` and `RESULT_PLAN_TRIVIAL` from the process
    /// environment.
    pub fn with_env_overrides(self) -> Result<Self, OptionsError> {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, OptionsError> {
        if let Some(list) = lookup(ADDRESS_ONLY_ENV) {
            for name in split_list(&list) {
                self.trivial.remove(&name);
                self.address_only.insert(name);
            }
        }
        if let Some(list) = lookup(TRIVIAL_ENV) {
            self.trivial.extend(split_list(&list));
        }
        self.validate()
    }

    pub fn is_address_only_nominal(&self, name: &str) -> bool {
        self.address_only.contains(name)
    }

    pub fn is_trivial_nominal(&self, name: &str) -> bool {
        self.trivial.contains(name)
    }

    pub fn bridged_name(&self, name: &str) -> Option<&str> {
        self.bridged.get(name).map(String::as_str)
    }
}

fn split_list(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_know_standard_trivial_types() {
        let options = LoweringOptions::default();
        assert!(options.is_trivial_nominal("Int"));
        assert!(!options.is_trivial_nominal("String"));
        assert_eq!(options.bridged_name("String"), Some("NSString"));
    }

    #[test]
    fn toml_lists_replace_their_defaults() {
        let options = LoweringOptions::from_toml_str(
            r#"
address_only = ["Resilient"]
trivial = ["Pixel"]
"#,
        )
        .expect("options");
        assert!(options.is_address_only_nominal("Resilient"));
        assert!(options.is_trivial_nominal("Pixel"));
        assert!(!options.is_trivial_nominal("Int"));
        assert!(options.bridged_name("String").is_some());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = LoweringOptions::from_toml_str("adress_only = []").expect_err("typo");
        assert!(matches!(err, OptionsError::Parse(_)));
    }

    #[test]
    fn env_overrides_move_types_to_address_only() {
        let options = LoweringOptions::default()
            .with_overrides_from(|key| match key {
                ADDRESS_ONLY_ENV => Some("Int, Widget".into()),
                TRIVIAL_ENV => Some("Pixel".into()),
                _ => None,
            })
            .expect("overrides");
        assert!(options.is_address_only_nominal("Int"));
        assert!(options.is_address_only_nominal("Widget"));
        assert!(!options.is_trivial_nominal("Int"));
        assert!(options.is_trivial_nominal("Pixel"));
    }

    #[test]
    fn conflicting_lists_are_rejected() {
        let err = LoweringOptions::from_toml_str(
            r#"
address_only = ["Pixel"]
trivial = ["Pixel"]
"#,
        )
        .expect_err("conflict");
        assert!(matches!(err, OptionsError::Conflict { name } if name == "Pixel"));
    }
}
