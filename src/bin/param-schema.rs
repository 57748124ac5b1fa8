//! param-schema CLI
//!
//! Command-line interface for checking operation definitions and validating
//! request inputs against them.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use param_schema::{
    load_json_auto, CompileOptions, Operation, OperationDefinition, OperationInputs, ParamError,
    TypeRegistry, DEFAULT_MAX_DEPTH,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "param-schema")]
#[command(about = "Check operation definitions and validate request parameters")]
#[command(version)]
struct Cli {
    /// Maximum nesting depth of custom schemas and arrays
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered types
    Types {
        /// Output the registry description as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile an operation definition and report declaration errors
    Check {
        /// Definition source: file path or URL (http:// or https://)
        definition: String,
    },

    /// Print the documentation derived from an operation definition
    Describe {
        /// Definition source: file path or URL (http:// or https://)
        definition: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate request inputs against an operation definition
    Validate {
        /// Definition source: file path or URL (http:// or https://)
        definition: String,

        /// Inputs document: {"params", "query", "body", "headers"}
        inputs: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = CompileOptions::new().max_depth(cli.max_depth);

    let result = match cli.command {
        Commands::Types { json } => run_types(json),
        Commands::Check { definition } => run_check(&definition, &options),
        Commands::Describe { definition, pretty } => run_describe(&definition, &options, pretty),
        Commands::Validate {
            definition,
            inputs,
            json,
        } => run_validate(&definition, &inputs, &options, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_types(json_output: bool) -> Result<(), u8> {
    let registry = TypeRegistry::new();
    if json_output {
        println!("{}", registry.describe());
        return Ok(());
    }
    for entry in registry.iter() {
        let mut line = entry.name().to_string();
        if entry.is_params_required() {
            line.push_str(" (params required)");
        }
        if let Some(desc) = entry.get_description() {
            line.push_str(" - ");
            line.push_str(desc);
        }
        println!("{}", line);
    }
    Ok(())
}

/// Load a definition and build its sealed operation with a fresh registry.
fn load_operation(
    source: &str,
    options: &CompileOptions,
    json_output: bool,
) -> Result<Operation, u8> {
    let doc = load_json_auto(source).map_err(|e| {
        report_error(json_output, &format!("loading definition: {}", e));
        e.exit_code() as u8
    })?;
    let definition = OperationDefinition::from_value(&doc).map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })?;
    let mut registry = TypeRegistry::new();
    definition.build(&mut registry, options).map_err(|e| {
        report_param_error(json_output, &e);
        e.exit_code() as u8
    })
}

fn run_check(source: &str, options: &CompileOptions) -> Result<(), u8> {
    let operation = load_operation(source, options, false)?;
    println!("{}: ok", operation.key());
    Ok(())
}

fn run_describe(source: &str, options: &CompileOptions, pretty: bool) -> Result<(), u8> {
    let operation = load_operation(source, options, false)?;
    let description = operation.describe();
    let output = if pretty {
        serde_json::to_string_pretty(&description)
    } else {
        serde_json::to_string(&description)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", output);
    Ok(())
}

fn run_validate(
    source: &str,
    inputs_source: &str,
    options: &CompileOptions,
    json_output: bool,
) -> Result<(), u8> {
    let operation = load_operation(source, options, json_output)?;

    let doc = load_json_auto(inputs_source).map_err(|e| {
        report_error(json_output, &format!("loading inputs: {}", e));
        e.exit_code() as u8
    })?;
    let inputs: OperationInputs = serde_json::from_value(doc).map_err(|e| {
        report_error(json_output, &format!("invalid inputs document: {}", e));
        2u8
    })?;

    match operation.validate_inputs(&inputs) {
        Ok(merged) => {
            if json_output {
                println!("{}", json!({ "valid": true, "output": merged }));
            } else {
                println!("{}", Value::Object(merged));
            }
            Ok(())
        }
        Err(e) => {
            report_param_error(json_output, &e);
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", json!({ "valid": false, "error": { "message": msg } }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn report_param_error(json_output: bool, err: &ParamError) {
    if json_output {
        println!("{}", json!({ "valid": false, "error": err.report() }));
    } else {
        eprintln!("Error: {}", err);
    }
}
