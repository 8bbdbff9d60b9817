use anyhow::{Context, Result, anyhow};
use clap::Args;
use quill_core::Component;
use quill_dom::diff::diff;
use quill_dom::{Map, Value};
use quill_markup::{MarkupConfig, Registry, SharedTemplate, Using, generate};
use std::fs;
use std::path::{Path, PathBuf};

/// Options that shape the markup dialect, shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct DialectArgs {
    /// JSON file with markup settings (`namespace`, `script_tag`, `native_tags`, `collapse_whitespace`)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Statement prefix, overrides the config file (default `wx:`)
    #[arg(long, global = true)]
    pub namespace: Option<String>,
    /// Script module tag, overrides the config file (default `wxs`)
    #[arg(long, global = true)]
    pub script_tag: Option<String>,
    /// Template usable as a component, registered under its file stem. Repeatable.
    #[arg(long = "component", short = 'c', global = true)]
    pub components: Vec<PathBuf>,
}

pub fn load_config(args: &DialectArgs) -> Result<MarkupConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let src = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&src)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => MarkupConfig::default(),
    };
    if let Some(ns) = &args.namespace {
        config.namespace = ns.clone();
    }
    if let Some(tag) = &args.script_tag {
        config.script_tag = tag.clone();
    }
    Ok(config)
}

/// Reads a JSON object used as render data. No file means empty data.
pub fn load_data(path: Option<&Path>) -> Result<Map> {
    let Some(path) = path else {
        return Ok(Map::new());
    };
    let src =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&src).with_context(|| format!("invalid JSON in {}", path.display()))?;
    match Value::from(json) {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!(
            "{} must hold a JSON object, found {}",
            path.display(),
            other.type_name()
        )),
    }
}

fn stem(path: &Path) -> &str {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("template")
}

/// Registers the component templates, then compiles `input` against them.
pub fn compile_file(input: &Path, args: &DialectArgs) -> Result<SharedTemplate> {
    let mut registry = Registry::new(load_config(args)?);
    let none = Using::new();
    for path in &args.components {
        let src =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        registry
            .register(stem(path), &src, &none)
            .with_context(|| format!("failed to compile {}", path.display()))?;
    }

    let src =
        fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let template = registry
        .register(stem(input), &src, &none)
        .with_context(|| format!("failed to compile {}", input.display()))?;
    tracing::debug!(template = template.name(), nodes = template.len(), "compiled");
    Ok(template)
}

/// Renders `input` with `data` into an in-memory host and returns the HTML.
pub fn render_cmd(input: &Path, data: Option<&Path>, args: &DialectArgs) -> Result<String> {
    let template = compile_file(input, args)?;
    let component = Component::new(template, load_data(data)?)
        .map_err(|e| anyhow!(e))
        .context("render failed")?;
    Ok(component.to_html())
}

/// Outline of the compiled template, one node per line.
pub fn ast_cmd(input: &Path, args: &DialectArgs) -> Result<String> {
    Ok(compile_file(input, args)?.outline())
}

/// Diffs the renders of `input` under two data sets.
///
/// Without `apply` the patch list is printed; with it, the first render is patched in place
/// and the resulting HTML is printed.
pub fn diff_cmd(
    input: &Path,
    before: &Path,
    after: &Path,
    apply: bool,
    args: &DialectArgs,
) -> Result<String> {
    let template = compile_file(input, args)?;
    let before = load_data(Some(before))?;
    let after = load_data(Some(after))?;

    if apply {
        let mut component = Component::new(template, before)
            .map_err(|e| anyhow!(e))
            .context("render failed")?;
        component
            .set_data(after)
            .map_err(|e| anyhow!(e))
            .context("patch failed")?;
        return Ok(component.to_html());
    }

    let patches = diff(&generate(&template, &before), &generate(&template, &after));
    let mut out = String::new();
    for patch in &patches {
        out.push_str(&format!("{patch:#?}\n"));
    }
    Ok(out)
}
