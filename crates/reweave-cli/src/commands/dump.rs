//! `reweave dump` — Disassemble a module to readable text.

use anyhow::Context;
use reweave_bytecode::{disassemble, Module};
use std::fs;
use std::path::PathBuf;

pub fn execute(file: PathBuf) -> anyhow::Result<()> {
    let bytes = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    let module =
        Module::decode(&bytes).with_context(|| format!("decoding {}", file.display()))?;

    print!("{}", disassemble(&module));
    Ok(())
}
