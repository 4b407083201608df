mod install;
mod plan;
mod unpack;

pub use install::cmd_install;
pub use plan::cmd_plan;
pub use unpack::cmd_unpack;

use anyhow::{Context, Result};
use tracing::debug;

use flinger_lib::{Config, Overrides};

use crate::ConfigArgs;
use crate::output::print_warning;

/// Resolves the configuration. `Ok(None)` means there is nothing to do.
fn load_config(args: ConfigArgs) -> Result<Option<Config>> {
  let overrides = Overrides {
    basenames: args.basenames,
    store_prefix: args.store_prefix,
    base: args.base,
    bin_dir: args.bin_dir,
  };

  debug!(manifest = %args.manifest.display(), "loading configuration");
  match Config::load(&args.manifest, overrides) {
    Ok(config) => Ok(Some(config)),
    Err(e) if e.is_noop() => {
      print_warning(&format!("Nothing to install: {}", e));
      Ok(None)
    }
    Err(e) => Err(e).context("Failed to load configuration"),
  }
}
