// config.rs — Policy document subcommands: init, show.

use std::path::Path;

use anyhow::Context;
use clap::Subcommand;

use guardian_config::ConfigStore;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Seed the bootstrap policy document if none exists.
    Init,
    /// Print the effective policy document.
    Show,
}

pub fn run(home: &Path, command: ConfigCommands) -> anyhow::Result<()> {
    let store = ConfigStore::new(home);

    match command {
        ConfigCommands::Init => {
            store.load().context("loading config")?;
            println!("config ready at {}", store.config_path().display());
            Ok(())
        }
        ConfigCommands::Show => {
            let root = store.load().context("loading config")?;
            print!("{}", serde_yaml::to_string(&root)?);
            Ok(())
        }
    }
}
