//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use scopevar_application::VariableEngine;
use scopevar_domain::{GlobalSettings, Value};

use crate::error::AppResult;
use crate::settings::load_settings;

/// How templates are substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// Each template on its own; a lone reference keeps its value type.
    Scalar,
    /// Each template on its own, always producing text.
    #[default]
    String,
    /// All templates as one list; lone `@{list}` templates are expanded.
    List,
}

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "scopevar")]
#[command(about = "Resolve ${variable} references in templates")]
#[command(version)]
pub struct Cli {
    /// Templates to resolve
    pub templates: Vec<String>,

    /// Variable in NAME:VALUE form; may be repeated
    #[arg(short = 'v', long = "variable", value_name = "NAME:VALUE")]
    pub variables: Vec<String>,

    /// Settings file (.json, .yaml or .yml)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// How templates are resolved
    #[arg(short, long, value_enum, default_value_t = Mode::String)]
    pub mode: Mode,

    /// Keep unresolvable references as text instead of failing
    #[arg(long)]
    pub ignore_errors: bool,

    /// Do not read the process environment for %{NAME} references
    #[arg(long)]
    pub no_process_env: bool,
}

/// Resolves the templates given on the command line, one output line per
/// result.
///
/// # Errors
///
/// Returns an error if settings cannot be loaded or a template cannot be
/// resolved.
pub fn run(cli: &Cli) -> AppResult<Vec<String>> {
    let mut settings = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => GlobalSettings::new(),
    };
    settings.variables.extend(cli.variables.iter().cloned());
    if cli.no_process_env {
        settings.process_environment = false;
    }

    let mut engine = VariableEngine::from_settings(&settings)?;
    engine.enter_suite();
    tracing::debug!(templates = cli.templates.len(), mode = ?cli.mode, "resolving templates");

    let variables = engine.scopes().current();
    let lines = match cli.mode {
        Mode::Scalar => cli
            .templates
            .iter()
            .map(|template| {
                variables
                    .replace_scalar(&Value::from(template.as_str()), cli.ignore_errors)
                    .map(|value| value.to_string())
            })
            .collect::<Result<Vec<_>, _>>()?,
        Mode::String => cli
            .templates
            .iter()
            .map(|template| variables.replace_string(template, cli.ignore_errors))
            .collect::<Result<Vec<_>, _>>()?,
        Mode::List => {
            let items: Vec<Value> = cli
                .templates
                .iter()
                .map(|template| Value::from(template.as_str()))
                .collect();
            variables
                .replace_list(&items, None, cli.ignore_errors)?
                .iter()
                .map(ToString::to_string)
                .collect()
        }
    };
    engine.leave_suite()?;
    Ok(lines)
}
