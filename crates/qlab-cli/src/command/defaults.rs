use std::path::PathBuf;

use crate::{
    config::{EnvKind, ExperimentConfig},
    util,
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct DefaultsArg {
    /// Environment to print defaults for
    #[arg(long, default_value = "cartpole")]
    env: EnvKind,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &DefaultsArg) -> anyhow::Result<()> {
    let DefaultsArg { env, output } = arg;
    let config = ExperimentConfig::defaults(*env);
    util::save_json(&config, output.as_deref())?;
    if let Some(path) = output {
        eprintln!("Default {env} config saved to {}", path.display());
    }
    Ok(())
}
