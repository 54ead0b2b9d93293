//! Human-readable rendering of result plans.
//!
//! ```text
//! TupleDestination into tuple of 2
//!   InPlace into let shape in %0 : $*any Shape
//!   Scalar <- direct at Int -> let count : $Int
//! ```

use super::ResultPlan;

pub fn explain_plan(plan: &ResultPlan) -> String {
    let mut lines = Vec::new();
    format_plan(plan, 0, &mut lines);
    lines.join("\n")
}

fn format_plan(plan: &ResultPlan, indent: usize, lines: &mut Vec<String>) {
    let prefix = "  ".repeat(indent);
    let line = match plan {
        ResultPlan::InPlace { destination } => {
            format!("InPlace into {}", destination.describe())
        }
        ResultPlan::Scalar {
            temporary,
            orig,
            destination,
        } => {
            let source = match temporary {
                Some(temporary) => format!("temporary {}", temporary.address().value),
                None => "direct".to_string(),
            };
            let sink = match destination {
                Some(destination) => destination.describe(),
                None => "value".to_string(),
            };
            format!("Scalar <- {source} at {orig} -> {sink}")
        }
        ResultPlan::TupleValue { elements } => format!("TupleValue of {}", elements.len()),
        ResultPlan::TupleDestination { destination, .. } => {
            format!("TupleDestination into {}", destination.describe())
        }
        ResultPlan::IndirectStoreFromTemporary {
            destination,
            temporary,
            ..
        } => format!(
            "IndirectStoreFromTemporary {} into {}",
            temporary.address().value,
            destination.describe()
        ),
        ResultPlan::StoreFromValue { destination, .. } => {
            format!("StoreFromValue into {}", destination.describe())
        }
    };
    lines.push(format!("{prefix}{line}"));
    for child in plan.children() {
        format_plan(child, indent + 1, lines);
    }
}
