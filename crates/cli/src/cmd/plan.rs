//! Implementation of the `flinger plan` command.
//!
//! Resolves closures against the store and the cache without downloading any
//! archive, and lists what `install` would fetch.

use anyhow::Result;
use serde::Serialize;

use flinger_lib::decompress::Compression;
use flinger_lib::{Basename, HttpsTransport, Installer};

use super::load_config;
use crate::ConfigArgs;
use crate::output::{OutputFormat, print_info, print_json, print_stat, short_basename, symbols};

#[derive(Serialize)]
struct PlannedObject {
  basename: Basename,
  url: String,
  compression: Compression,
}

pub fn cmd_plan(args: ConfigArgs, output: OutputFormat) -> Result<()> {
  let Some(config) = load_config(args)? else {
    if output.is_json() {
      print_json(&Vec::<PlannedObject>::new())?;
    }
    return Ok(());
  };

  let planned: Vec<PlannedObject> = Installer::from_config(HttpsTransport::new(), &config)
    .plan(&config.basenames)?
    .into_iter()
    .map(|(basename, metadata)| PlannedObject {
      basename,
      url: metadata.download_url.to_string(),
      compression: metadata.compression,
    })
    .collect();

  if output.is_json() {
    return print_json(&planned);
  }

  if planned.is_empty() {
    print_info("Nothing to download");
    return Ok(());
  }

  for object in &planned {
    println!(
      "  {} {} ({})",
      symbols::INFO,
      short_basename(object.basename.as_str()),
      object.compression
    );
  }
  println!();
  print_stat("To download", &planned.len().to_string());

  Ok(())
}
