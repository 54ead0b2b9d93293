//! Scenario files: one call site described in TOML, planned and emitted on demand.
//!
//! ```toml
//! name = "tagged shape"
//! callee = "make_tagged"
//! convention = "thick"
//! orig = "(Int, $T)"
//! subst = "(Int, any Shape)"
//! destination = { kind = "binding", name = "pair" }
//!
//! [lowering]
//! address_only = ["Resilient"]
//! ```

use crate::codegen::{
    builder::FunctionBuilder,
    destination::{AddressDestination, BindingDestination, Destination, TupleDestination},
};
use crate::language::{
    abstraction::AbstractionPattern, errors::SyntaxError, parser::parse_type, span::Span,
    types::TypeExpr,
};
use crate::lowering::{
    convention::Representation,
    options::{LoweringOptions, OptionsError},
    ResultConvention, ResultSlot, TypeConverter,
};
use crate::plan::{apply::plan_results, explain::explain_plan, PlanContext};
use serde::Deserialize;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_callee")]
    pub callee: String,
    #[serde(default)]
    pub convention: Option<String>,
    pub orig: String,
    pub subst: String,
    #[serde(default)]
    pub destination: DestinationSpec,
    /// Expected result conventions, checked against the lowered signature.
    #[serde(default)]
    pub slots: Option<Vec<SlotKind>>,
    #[serde(default)]
    pub lowering: LoweringOptions,
}

fn default_name() -> String {
    "scenario".to_string()
}

fn default_callee() -> String {
    "callee".to_string()
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DestinationSpec {
    #[default]
    None,
    /// A fresh stack slot of the substituted type.
    Address,
    Binding {
        name: String,
    },
    /// `let (a, b, ...) = ...`
    Tuple {
        names: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Indirect,
    Direct,
}

impl From<ResultConvention> for SlotKind {
    fn from(convention: ResultConvention) -> Self {
        match convention {
            ResultConvention::Indirect => SlotKind::Indirect,
            ResultConvention::Direct => SlotKind::Direct,
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Indirect => f.write_str("indirect"),
            SlotKind::Direct => f.write_str("direct"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {path}: {error}")]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },
    #[error("invalid scenario: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid `{field}` type `{text}`: {error}")]
    Syntax {
        field: &'static str,
        text: String,
        error: SyntaxError,
    },
    #[error("{0}")]
    Convention(String),
    #[error("pattern `{orig}` does not have the shape of `{subst}`")]
    ShapeMismatch { orig: String, subst: String },
    #[error("destination expects {expected} elements but `{subst}` has {actual}")]
    DestinationArity {
        subst: String,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error(
        "expected result slots [{}] but the signature lowers to [{}]",
        join_slots(.expected),
        join_slots(.actual)
    )]
    SlotMismatch {
        expected: Vec<SlotKind>,
        actual: Vec<SlotKind>,
    },
}

fn join_slots(slots: &[SlotKind]) -> String {
    slots
        .iter()
        .map(SlotKind::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A scenario whose types have been parsed and checked.
#[derive(Debug)]
pub struct PreparedScenario {
    pub name: String,
    pub callee: String,
    pub rep: Representation,
    pub orig: AbstractionPattern,
    pub subst: TypeExpr,
    pub destination: DestinationSpec,
    pub types: TypeConverter,
    pub slots: Vec<ResultSlot>,
}

/// Everything a scenario run produced, ready for printing.
#[derive(Debug)]
pub struct ScenarioReport {
    pub name: String,
    pub slots: Vec<String>,
    pub plan: String,
    pub result: Option<String>,
    pub listing: String,
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario: {}", self.name)?;
        writeln!(f, "slots:")?;
        if self.slots.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for slot in &self.slots {
            writeln!(f, "  {slot}")?;
        }
        writeln!(f, "plan:")?;
        for line in self.plan.lines() {
            writeln!(f, "  {line}")?;
        }
        if let Some(result) = &self.result {
            writeln!(f, "result: {result}")?;
        }
        write!(f, "{}", self.listing)
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path).map_err(|error| ScenarioError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let scenario = Self::from_toml_str(&content)?;
        info!(path = %path.display(), name = %scenario.name, "loaded scenario");
        Ok(scenario)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(source)?)
    }

    /// Parses the types, applies environment overrides to the lowering options and
    /// lowers the result signature.
    pub fn prepare(&self) -> Result<PreparedScenario, ScenarioError> {
        let options = self.lowering.clone().with_env_overrides()?;
        self.prepare_with(options)
    }

    pub fn prepare_with(
        &self,
        options: LoweringOptions,
    ) -> Result<PreparedScenario, ScenarioError> {
        let rep = match &self.convention {
            Some(name) => name.parse::<Representation>().map_err(ScenarioError::Convention)?,
            None => Representation::default(),
        };
        let orig = AbstractionPattern::of(&parse_field("orig", &self.orig)?);
        let subst = parse_field("subst", &self.subst)?;
        if subst.has_params() {
            return Err(ScenarioError::Syntax {
                field: "subst",
                text: self.subst.clone(),
                error: SyntaxError::new(
                    "substituted type still mentions generic parameters",
                    Span::new(0, self.subst.len()),
                ),
            });
        }
        if !orig.matches_shape(&subst) {
            return Err(ScenarioError::ShapeMismatch {
                orig: orig.to_string(),
                subst: subst.to_string(),
            });
        }
        if let DestinationSpec::Tuple { names } = &self.destination {
            let actual = subst.tuple_elements().map(<[_]>::len).unwrap_or(0);
            if !subst.is_tuple() || names.len() != actual {
                return Err(ScenarioError::DestinationArity {
                    subst: subst.to_string(),
                    expected: names.len(),
                    actual,
                });
            }
        }

        let types = TypeConverter::new(options);
        let slots = types.result_slots(&orig, &subst, rep);
        if let Some(expected) = &self.slots {
            let actual: Vec<SlotKind> = slots.iter().map(|slot| slot.convention.into()).collect();
            if *expected != actual {
                return Err(ScenarioError::SlotMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        debug!(scenario = %self.name, %rep, slots = slots.len(), "prepared scenario");

        Ok(PreparedScenario {
            name: self.name.clone(),
            callee: self.callee.clone(),
            rep,
            orig,
            subst,
            destination: self.destination.clone(),
            types,
            slots,
        })
    }
}

fn parse_field(field: &'static str, text: &str) -> Result<TypeExpr, ScenarioError> {
    parse_type(text).map_err(|error| ScenarioError::Syntax {
        field,
        text: text.to_string(),
        error,
    })
}

impl PreparedScenario {
    /// Plans the results without emitting the call.
    pub fn explain(&self) -> ScenarioReport {
        let builder = FunctionBuilder::new(&self.name, self.types.clone());
        let cx = PlanContext::new(&builder, self.rep);
        let destination = self.make_destination(&builder);
        let planned = plan_results(cx, &self.slots, destination, &self.orig, &self.subst);
        ScenarioReport {
            name: self.name.clone(),
            slots: self.slot_lines(),
            plan: explain_plan(&planned.plan),
            result: None,
            listing: builder.listing(),
        }
    }

    /// Plans the results, emits the call and finishes the plan, then closes the scope
    /// so every cleanup shows up in the listing.
    pub fn run(&self) -> ScenarioReport {
        let builder = FunctionBuilder::new(&self.name, self.types.clone());
        let cx = PlanContext::new(&builder, self.rep);
        let destination = self.make_destination(&builder);
        let planned = plan_results(cx, &self.slots, destination, &self.orig, &self.subst);
        let plan = explain_plan(&planned.plan);
        let result = planned.emit(cx, &self.callee, &self.subst);
        let rendered = result.to_string();
        drop(result);
        builder.pop_scope();
        info!(
            scenario = %self.name,
            instructions = builder.instruction_count(),
            "emitted scenario"
        );
        ScenarioReport {
            name: self.name.clone(),
            slots: self.slot_lines(),
            plan,
            result: Some(rendered),
            listing: builder.listing(),
        }
    }

    fn slot_lines(&self) -> Vec<String> {
        self.slots.iter().map(ResultSlot::to_string).collect()
    }

    fn make_destination(&self, builder: &FunctionBuilder) -> Option<Box<dyn Destination>> {
        match &self.destination {
            DestinationSpec::None => None,
            DestinationSpec::Address => {
                let address = builder.alloc_stack(builder.types().lower(&self.subst));
                Some(Box::new(AddressDestination::new(address)))
            }
            DestinationSpec::Binding { name } => Some(Box::new(BindingDestination::new(
                builder,
                name.as_str(),
                &self.subst,
            ))),
            DestinationSpec::Tuple { names } => {
                let elements = names
                    .iter()
                    .enumerate()
                    .map(|(index, name)| {
                        Box::new(BindingDestination::new(
                            builder,
                            name.as_str(),
                            self.subst.tuple_element_type(index),
                        )) as Box<dyn Destination>
                    })
                    .collect();
                Some(Box::new(TupleDestination::new(elements)))
            }
        }
    }
}
