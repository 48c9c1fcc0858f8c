// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Thin wrapper around the `objcopy` binary, used to append and read
//! back the `linglong.meta`/`linglong.bundle`/`linglong.icon` ELF
//! sections of a UAB file (§6).

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{Error, Result};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

async fn run(mut command: Command) -> Result<Vec<u8>> {
    let program = format!("{:?}", command.as_std().get_program());
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let child = command.spawn().map_err(Error::Io)?;
    let output = tokio::time::timeout(COMMAND_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| Error::CommandTimeout(program.clone()))?
        .map_err(Error::Io)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.chars().rev().take(2000).collect::<String>().chars().rev().collect();
        return Err(Error::CommandFailed {
            command: program,
            code: output.status.code(),
            stderr_tail: tail,
        });
    }
    Ok(output.stdout)
}

/// Append `path`'s contents to `elf_path` as a new section named `name`.
pub async fn add(elf_path: &Path, name: &str, path: &Path) -> Result<()> {
    let mut command = Command::new("objcopy");
    command
        .arg("--add-section")
        .arg(format!("{name}={}", path.display()))
        .arg(elf_path);
    run(command).await?;
    Ok(())
}

/// Dump section `name` out of `elf_path` and return its bytes.
pub async fn dump(elf_path: &Path, name: &str) -> Result<Vec<u8>> {
    let dest = tempfile::NamedTempFile::new().map_err(Error::Io)?;
    let mut command = Command::new("objcopy");
    command
        .arg(format!("--dump-section={name}={}", dest.path().display()))
        .arg(elf_path)
        .arg("/dev/null");
    run(command).await?;
    std::fs::read(dest.path()).map_err(Error::Io)
}
