//! `quill`: render and inspect quill templates from the command line.
//!
//! ```text
//! quill render page.xml card.xml --context '{"title": "Hi"}'
//! quill render page.xml --context @data.json
//! quill listing page.xml
//! quill --log quill_template=trace counter --clicks 5
//! ```

mod args;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use quill_engine::logging::{LoggingConfig, init_logging};
use quill_engine::{Document, Event, MemoryDocument, NodeId};
use quill_template::{DataContext, TemplateRegistry, Value};

use crate::args::{Cli, Command, TemplateArgs};

const COUNTER_TEMPLATE: &str = include_str!("../ui/counter.xml");

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::default();
    if let Some(filter) = cli.log {
        logging = logging.with_filter(filter);
    }
    init_logging(logging);

    match cli.command {
        Command::Render { templates, context } => {
            let (mut registry, name) = load(&templates)?;
            let data = match context {
                Some(arg) => parse_context(&arg)?,
                None => DataContext::new(),
            };
            let html = registry
                .render_to_string(&name, &data)
                .with_context(|| format!("failed to render `{name}`"))?;
            println!("{html}");
        }
        Command::Listing { templates } => {
            let (mut registry, name) = load(&templates)?;
            let listing = registry
                .listing(&name)
                .with_context(|| format!("failed to compile `{name}`"))?;
            print!("{listing}");
        }
        Command::Counter { clicks } => run_counter(clicks)?,
    }
    Ok(())
}

// ── templates ─────────────────────────────────────────────────────────────

/// Register every file under its stem. Returns the registry and the name
/// to render.
fn load(args: &TemplateArgs) -> Result<(TemplateRegistry, String)> {
    let mut registry = TemplateRegistry::new();
    let mut first = None;
    for path in &args.files {
        let name = template_name(path)?;
        let markup =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        registry
            .add(name.clone(), &markup)
            .with_context(|| format!("invalid template {}", path.display()))?;
        log::info!("loaded `{name}` from {}", path.display());
        first.get_or_insert(name);
    }
    let name = match &args.name {
        Some(name) if !registry.contains(name) => bail!("no template named `{name}` was loaded"),
        Some(name) => name.clone(),
        None => first.ok_or_else(|| anyhow!("no template files given"))?,
    };
    Ok((registry, name))
}

fn template_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("cannot derive a template name from {}", path.display()))
}

/// Inline JSON, or `@path` naming a JSON file. The top level must be an
/// object.
fn parse_context(arg: &str) -> Result<DataContext> {
    let text = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read context file {path}"))?,
        None => arg.to_string(),
    };
    let json: serde_json::Value = serde_json::from_str(&text).context("context is not valid JSON")?;
    DataContext::from_json(&json).ok_or_else(|| anyhow!("context must be a JSON object"))
}

// ── counter ───────────────────────────────────────────────────────────────

fn counter_data() -> DataContext {
    let step = |delta: f64| {
        Value::function(move |data, _event| {
            let next = data.get("counter").to_number() + delta;
            data.set("counter", next);
            log::debug!("counter -> {next}");
        })
    };
    DataContext::new()
        .with("counter", 0)
        .with("increment", step(1.0))
        .with("decrement", step(-1.0))
}

/// Render the counter, click `+` on the first render `clicks` times, and
/// print the markup after each click.
fn run_counter(clicks: u32) -> Result<()> {
    let mut registry = TemplateRegistry::new();
    registry.add("counter", COUNTER_TEMPLATE)?;
    let data = counter_data();

    let root = registry.render("counter", &data)?;
    println!("{}", registry.document().serialize(&root));

    let plus = last_button(registry.document(), root)
        .context("counter template has no button")?;
    for _ in 0..clicks {
        registry.document().dispatch(plus, &Event::new("click"));
        println!("{}", registry.render_to_string("counter", &data)?);
    }
    Ok(())
}

fn last_button(doc: &MemoryDocument, root: NodeId) -> Option<NodeId> {
    doc.find_by_tag(root, "button").last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── context ───────────────────────────────────────────────────────────

    #[test]
    fn inline_context() {
        let data = parse_context(r#"{"title": "Hi", "n": 2}"#).unwrap();
        assert_eq!(data.get("title"), Value::from("Hi"));
        assert_eq!(data.get("n"), Value::from(2));
    }

    #[test]
    fn context_must_be_an_object() {
        assert!(parse_context("[1, 2]").is_err());
        assert!(parse_context("{oops").is_err());
        assert!(parse_context("@/definitely/not/here.json").is_err());
    }

    #[test]
    fn template_names_come_from_file_stems() {
        assert_eq!(template_name(Path::new("ui/card.xml")).unwrap(), "card");
    }

    // ── counter ───────────────────────────────────────────────────────────

    #[test]
    fn counter_buttons_update_the_count() {
        let mut registry = TemplateRegistry::new();
        registry.add("counter", COUNTER_TEMPLATE).unwrap();
        let data = counter_data();
        let root = registry.render("counter", &data).unwrap();

        let buttons = registry.document().find_by_tag(root, "button");
        assert_eq!(buttons.len(), 2);
        registry.document().dispatch(buttons[1], &Event::new("click"));
        registry.document().dispatch(buttons[1], &Event::new("click"));
        registry.document().dispatch(buttons[0], &Event::new("click"));
        assert_eq!(data.get("counter"), Value::from(1));

        let nodes = registry.document().len();
        let html = registry.render_to_string("counter", &data).unwrap();
        assert!(html.contains("<span>Value: 1</span>"), "got {html}");
        registry.render_to_string("counter", &data).unwrap();
        assert_eq!(registry.document().len(), nodes);
    }
}
