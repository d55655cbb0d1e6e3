//! `reweave verify` — Check the stack discipline of a module.

use anyhow::Context;
use reweave_bytecode::{verify_module, Module};
use std::fs;
use std::path::PathBuf;
use termcolor::ColorChoice;

use crate::output::StyledOutput;

pub fn execute(file: PathBuf, choice: ColorChoice) -> anyhow::Result<()> {
    let mut out = StyledOutput::new(choice);

    let bytes = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    let module =
        Module::decode(&bytes).with_context(|| format!("decoding {}", file.display()))?;

    verify_module(&module).with_context(|| format!("verifying {}", file.display()))?;

    out.success("OK");
    out.plain(&format!(
        " {} ({} type{})",
        file.display(),
        module.types.len(),
        if module.types.len() == 1 { "" } else { "s" }
    ));
    out.newline();
    out.flush();
    Ok(())
}
