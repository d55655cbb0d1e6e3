//! `reweave weave` — Rewrite marker-tagged property assignments.

use anyhow::{bail, Context};
use reweave_bytecode::{verify_module, Module};
use reweave_weaver::{WeaveConfig, Weaver};
use std::fs;
use std::path::{Path, PathBuf};
use termcolor::ColorChoice;

use crate::output::StyledOutput;

const DEFAULT_CONFIG: &str = "reweave.toml";

pub fn execute(
    file: PathBuf,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    verify: bool,
    json: bool,
    choice: ColorChoice,
) -> anyhow::Result<()> {
    let mut out = StyledOutput::new(choice);

    let config = load_config(config.as_deref())?;
    let weaver = Weaver::new(&config)?;

    let bytes = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    let mut module =
        Module::decode(&bytes).with_context(|| format!("decoding {}", file.display()))?;

    let report = weaver.weave_module(&mut module)?;

    if json {
        let value = serde_json::json!({
            "module": module.metadata.name,
            "properties_woven": report.properties_woven,
            "sites_skipped": report.sites_skipped,
            "diagnostics": report.diagnostics.errors(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for diagnostic in report.diagnostics.errors() {
            out.stderr_error(&diagnostic.to_string());
        }
    }

    if report.has_errors() {
        bail!(
            "weaving {} failed with {} error(s)",
            file.display(),
            report.diagnostics.len()
        );
    }

    if verify {
        verify_module(&module).context("verifying the woven module")?;
    }

    let woven = module.encode()?;
    let target = output.unwrap_or(file);
    fs::write(&target, woven).with_context(|| format!("writing {}", target.display()))?;

    if !json {
        out.success("Woven");
        out.plain(&format!(
            " {} propert{} ({} site{} skipped) -> {}",
            report.properties_woven,
            if report.properties_woven == 1 { "y" } else { "ies" },
            report.sites_skipped,
            if report.sites_skipped == 1 { "" } else { "s" },
            target.display()
        ));
        out.newline();
        out.flush();
    }

    Ok(())
}

/// Load the weave configuration.
///
/// An explicit `--config` path must exist; otherwise `./reweave.toml` is
/// used when present, falling back to the built-in defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<WeaveConfig> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG).exists() => Path::new(DEFAULT_CONFIG),
        None => return Ok(WeaveConfig::default()),
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
