//! Implementation of the `flinger unpack` command.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};

use flinger_lib::archive;
use flinger_lib::decompress::{Compression, DecompressReader};

use crate::output::{OutputFormat, print_json, print_success};

pub fn cmd_unpack(archive_path: &Path, dest: &Path, compression: Compression, output: OutputFormat) -> Result<()> {
  let file = File::open(archive_path).with_context(|| format!("Failed to open {}", archive_path.display()))?;

  let mut reader = DecompressReader::new(BufReader::new(file), compression);
  archive::unpack(dest, &mut reader).with_context(|| format!("Failed to unpack {}", archive_path.display()))?;
  reader
    .finish()
    .with_context(|| format!("Failed to decompress {}", archive_path.display()))?;

  if output.is_json() {
    print_json(&serde_json::json!({ "archive": archive_path, "dest": dest }))
  } else {
    print_success(&format!("Unpacked {} into {}", archive_path.display(), dest.display()));
    Ok(())
  }
}
