use result_plan::{
    diagnostics::{report_scenario_error, report_usage},
    scenario::Scenario,
};
use std::env;
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "RESULT_PLAN_LOG";

fn main() {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let verbose = match args.iter().position(|arg| arg == "-v" || arg == "--verbose") {
        Some(index) => {
            args.remove(index);
            true
        }
        None => false,
    };
    init_logging(verbose);

    if args.len() != 2 {
        report_usage("expected a command and a scenario file");
        process::exit(2);
    }
    let command = args[0].as_str();
    let path = Path::new(&args[1]);

    if command != "explain" && command != "run" {
        report_usage(&format!("unknown command `{command}`"));
        process::exit(2);
    }

    let prepared = match Scenario::load(path).and_then(|scenario| scenario.prepare()) {
        Ok(prepared) => prepared,
        Err(err) => {
            report_scenario_error(path, &err);
            process::exit(1);
        }
    };

    let report = if command == "explain" {
        prepared.explain()
    } else {
        prepared.run()
    };
    println!("{report}");
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
