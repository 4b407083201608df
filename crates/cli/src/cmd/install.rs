//! Implementation of the `flinger install` command.
//!
//! Downloads the closure of every requested object into the store and links
//! the requested objects' binaries into the bin directory.

use anyhow::{Context, Result};

use flinger_lib::install::LinkOutcome;
use flinger_lib::{HttpsTransport, InstallReport, Installer};

use super::load_config;
use crate::ConfigArgs;
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success, print_warning, short_basename, symbols};

pub fn cmd_install(args: ConfigArgs, output: OutputFormat) -> Result<()> {
  let Some(config) = load_config(args)? else {
    if output.is_json() {
      print_json(&InstallReport::default())?;
    }
    return Ok(());
  };

  let installer = Installer::from_config(HttpsTransport::new(), &config);
  let report = match installer.install(&config.basenames) {
    Ok(report) => report,
    Err(e) => {
      let class = e.class();
      return Err(e).with_context(|| format!("Install failed ({} error)", class));
    }
  };

  if output.is_json() {
    return print_json(&report);
  }

  if report.installed.is_empty() {
    print_info("Everything already installed");
  }
  for basename in &report.installed {
    print_success(&format!("Installed {}", short_basename(basename.as_str())));
  }

  for link in &report.links {
    match link.outcome {
      LinkOutcome::Created | LinkOutcome::Replaced => print_info(&format!(
        "{} {} {}",
        link.link.display(),
        symbols::ARROW,
        link.target.display()
      )),
      LinkOutcome::Unchanged => {}
      LinkOutcome::ForeignSymlink => print_warning(&format!(
        "Skipped {}: symlink points outside the store",
        link.link.display()
      )),
      LinkOutcome::NotSymlink => print_warning(&format!("Skipped {}: not a symlink", link.link.display())),
    }
  }

  println!();
  print_stat("Installed", &report.installed.len().to_string());
  print_stat("Linked", &report.links.len().to_string());
  print_stat("Conflicts", &report.conflicts().count().to_string());
  print_stat("Store", &config.store_prefix.display().to_string());

  Ok(())
}
