use std::fmt;
use std::str::FromStr;

/// Calling convention of the operation whose results are being delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Representation {
    #[default]
    Thick,
    Thin,
    Method,
    WitnessMethod,
    CFunction,
    ForeignMethod,
    Block,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    Native,
    Foreign,
}

impl Representation {
    pub fn language(self) -> Language {
        match self {
            Representation::Thick
            | Representation::Thin
            | Representation::Method
            | Representation::WitnessMethod => Language::Native,
            Representation::CFunction | Representation::ForeignMethod | Representation::Block => {
                Language::Foreign
            }
        }
    }

    pub fn is_foreign(self) -> bool {
        matches!(self.language(), Language::Foreign)
    }

    pub fn name(self) -> &'static str {
        match self {
            Representation::Thick => "thick",
            Representation::Thin => "thin",
            Representation::Method => "method",
            Representation::WitnessMethod => "witness_method",
            Representation::CFunction => "c",
            Representation::ForeignMethod => "foreign_method",
            Representation::Block => "block",
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Representation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "thick" | "native" => Ok(Representation::Thick),
            "thin" => Ok(Representation::Thin),
            "method" => Ok(Representation::Method),
            "witness_method" => Ok(Representation::WitnessMethod),
            "c" | "cfunction" => Ok(Representation::CFunction),
            "foreign_method" => Ok(Representation::ForeignMethod),
            "block" => Ok(Representation::Block),
            other => Err(format!("unknown calling convention `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_representations_report_foreign_language() {
        assert!(Representation::CFunction.is_foreign());
        assert!(Representation::Block.is_foreign());
        assert!(!Representation::WitnessMethod.is_foreign());
        assert_eq!("native".parse::<Representation>(), Ok(Representation::Thick));
        assert!("fastcall".parse::<Representation>().is_err());
    }
}
