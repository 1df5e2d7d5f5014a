mod command;
mod config;
mod report;
mod util;
mod worker;

fn main() -> anyhow::Result<()> {
    command::run()
}
