//! JSON files read and written by the commands.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::Context as _;
use serde::Serialize;

use crate::config::ExperimentConfig;

/// Writes `value` as pretty JSON to the file at `output`, or to stdout when no
/// path is given.
pub fn save_json<T>(value: &T, output: Option<&Path>) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
{
    let target = output.map_or_else(|| "stdout".to_owned(), |path| path.display().to_string());
    let mut writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {target}"))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout().lock()),
    };
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write JSON to {target}"))?;
    writeln!(writer)
        .and_then(|()| writer.flush())
        .with_context(|| format!("Failed to flush output to {target}"))?;
    Ok(())
}

/// Reads an experiment configuration, as printed by `defaults`.
pub fn read_config_file(path: &Path) -> anyhow::Result<ExperimentConfig> {
    let file = File::open(path).with_context(|| {
        format!("Failed to open experiment config file: {}", path.display())
    })?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| {
        format!(
            "Failed to parse experiment config JSON file: {}",
            path.display()
        )
    })
}
