//! Dough Validate CLI - run the validation component against saved markup
//!
//! Commands: check, render
//! Outputs JSON or HTML to stdout, logs to stderr
//! Returns 2 when submission would be blocked

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use dough_validation::{
    boot, component::{merge_json, COMPONENT_ATTRIBUTE}, dispatch, Component, Document, EventKind,
    NodeId, UiEvent, Validation, ValidationConfig, LIBRARY_VERSION,
};

#[derive(Parser)]
#[command(name = "dough-validate")]
#[command(about = "Dough Validate - client-side form validation runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a ValidationConfig JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON object merged over the config
    #[arg(short, long)]
    options: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill in fields, submit, and report the errors
    Check {
        /// HTML file containing the form
        #[arg(short, long)]
        markup: PathBuf,

        /// Field value as id=value (repeatable)
        #[arg(short, long = "set", value_parser = parse_assignment)]
        values: Vec<(String, String)>,
    },

    /// Replay events and print the resulting markup
    Render {
        /// HTML file containing the form
        #[arg(short, long)]
        markup: PathBuf,

        /// Event as kind[:fieldId[=value]] (repeatable)
        #[arg(short, long = "event", value_parser = parse_event)]
        events: Vec<ScriptedEvent>,
    },
}

#[derive(Debug, Clone)]
struct ScriptedEvent {
    kind: EventKind,
    field: Option<String>,
    value: Option<String>,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(id, value)| (id.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected id=value, got {}", raw))
}

fn parse_event(raw: &str) -> Result<ScriptedEvent, String> {
    let (kind, target) = match raw.split_once(':') {
        Some((kind, target)) => (kind, Some(target)),
        None => (raw, None),
    };
    let kind: EventKind = kind.parse()?;
    let (field, value) = match target.map(|t| t.split_once('=')) {
        Some(Some((field, value))) => (Some(field.to_string()), Some(value.to_string())),
        Some(None) => (target.map(str::to_string), None),
        None => (None, None),
    };
    if field.is_none() && kind != EventKind::Submit {
        return Err(format!("{:?} events need a field id", kind));
    }
    Ok(ScriptedEvent { kind, field, value })
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    println!("{}", json!({ "error": message.to_string() }));
    ExitCode::FAILURE
}

fn build_overrides(config: Option<&Path>, options: Option<&str>) -> Result<Value, String> {
    // Only keys the file sets are layered over the markup config
    let mut overrides = match config {
        Some(path) => ValidationConfig::load_overrides(path).map_err(|e| e.to_string())?,
        None => json!({}),
    };
    if let Some(options) = options {
        let options: Value =
            serde_json::from_str(options).map_err(|e| format!("Invalid options: {}", e))?;
        merge_json(&mut overrides, &options);
    }
    Ok(overrides)
}

fn mount(markup: &Path, overrides: &Value) -> Result<(Document, Validation), String> {
    let html = fs::read_to_string(markup)
        .map_err(|e| format!("Failed to read {}: {}", markup.display(), e))?;
    let mut doc = Document::parse(&html);
    let root = doc
        .find_by_attr(doc.root(), COMPONENT_ATTRIBUTE, Validation::NAME)
        .or_else(|| doc.find_by_tags(doc.root(), &["form"]).first().copied())
        .ok_or("No form or Validation component found in markup")?;

    let validation = boot::<Validation, _>(&mut doc, root, Some(overrides), |status| {
        tracing::info!(?status, "component lifecycle");
    })
    .map_err(|e| e.to_string())?;
    Ok((doc, validation))
}

fn field_by_id(doc: &Document, id: &str) -> Result<NodeId, String> {
    doc.element_by_id(id)
        .ok_or_else(|| format!("No element with id {}", id))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let overrides = match build_overrides(cli.config.as_deref(), cli.options.as_deref()) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };

    match cli.command {
        Commands::Check { markup, values } => {
            let (mut doc, mut validation) = match mount(&markup, &overrides) {
                Ok(m) => m,
                Err(e) => return fail(e),
            };

            for (id, value) in &values {
                match field_by_id(&doc, id) {
                    Ok(field) => doc.set_value(field, value),
                    Err(e) => return fail(e),
                }
            }

            let mut submit = UiEvent::new(EventKind::Submit, validation.root());
            dispatch(&mut validation, &mut doc, &mut submit);

            let report = json!({
                "component": Validation::NAME,
                "version": LIBRARY_VERSION,
                "state": validation.state(),
                "submitted": !submit.default_prevented(),
                "errors": validation.errors().ordered_entries(),
            });
            println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());

            if submit.default_prevented() {
                ExitCode::from(2)  // Submission blocked
            } else {
                ExitCode::SUCCESS
            }
        }

        Commands::Render { markup, events } => {
            let (mut doc, mut validation) = match mount(&markup, &overrides) {
                Ok(m) => m,
                Err(e) => return fail(e),
            };

            for scripted in &events {
                let target = match &scripted.field {
                    Some(id) => match field_by_id(&doc, id) {
                        Ok(field) => field,
                        Err(e) => return fail(e),
                    },
                    None => validation.root(),
                };
                if let Some(value) = &scripted.value {
                    doc.set_value(target, value);
                }
                let mut event = UiEvent::new(scripted.kind, target);
                if !dispatch(&mut validation, &mut doc, &mut event) {
                    tracing::warn!(kind = ?scripted.kind, %target, "event not bound");
                }
            }

            println!("{}", doc.to_html());
            ExitCode::SUCCESS
        }
    }
}
