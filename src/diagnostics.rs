use crate::{language::errors::SyntaxError, scenario::ScenarioError};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource, err: SyntaxError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
            label: err.label,
        }
    }
}

/// A scenario file that is not valid TOML or does not fit the scenario schema.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct ScenarioFileDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("here")]
    span: Option<SourceSpan>,
    message: String,
}

pub fn report_scenario_error(path: &Path, error: &ScenarioError) {
    match error {
        ScenarioError::Syntax { field, text, error } => {
            let src = NamedSource::new(format!("{}: {field}", path.display()), text.clone());
            let diagnostic = SyntaxDiagnostic::from_error(src, error.clone());
            eprintln!("{:?}", Report::new(diagnostic));
        }
        ScenarioError::Toml(toml_error) => match fs::read_to_string(path) {
            Ok(content) => {
                let diagnostic = ScenarioFileDiagnostic {
                    src: NamedSource::new(path.display().to_string(), content),
                    span: toml_error.span().map(SourceSpan::from),
                    message: toml_error.message().to_string(),
                };
                eprintln!("{:?}", Report::new(diagnostic));
            }
            Err(_) => eprintln!("{}: {}", path.display(), error),
        },
        other => eprintln!("{}: {}", path.display(), other),
    }
}

pub fn report_usage(message: &str) {
    eprintln!("{message}");
    eprintln!("Usage: result-plan [explain|run] <scenario.toml> [-v]");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::parse_type;

    #[test]
    fn syntax_diagnostic_carries_label_and_help() {
        let err = parse_type("(Int, %)").expect_err("should fail");
        let expected_span = err.to_source_span();
        let src = NamedSource::new("scenario.toml: subst", "(Int, %)".to_string());
        let diagnostic = SyntaxDiagnostic::from_error(src, err);

        assert!(diagnostic.to_string().contains('%'), "{diagnostic}");
        let help = diagnostic.help().map(|help| help.to_string());
        assert!(help.is_some_and(|help| help.contains("any Shape")));
        let labels: Vec<_> = diagnostic.labels().expect("labels").collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].label(), Some("not a valid type here"));
        assert_eq!(labels[0].offset(), expected_span.offset());
    }
}
