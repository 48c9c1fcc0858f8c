// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Writes `<bundle>/00env.sh`, sourced by `/etc/profile.d/00env.sh` inside
//! the container so that the final environment is visible to every shell
//! and process started there, not just the initial `process.env` list.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Quote a value so that `export NAME=<quoted>` is safe for bash to source,
/// regardless of what characters the value contains.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub fn render(env: &BTreeMap<String, String>) -> String {
    let mut script = String::from("#!/bin/bash\n# generated by linyaps-container, do not edit\n");
    for (key, value) in env {
        script.push_str(&format!("export {}={}\n", key, quote(value)));
    }
    script
}

pub fn write(bundle_dir: &Path, env: &BTreeMap<String, String>) -> Result<()> {
    let path = bundle_dir.join("00env.sh");
    std::fs::write(&path, render(env)).map_err(|source| Error::EnvWrite {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("a'b"), r"'a'\''b'");
    }

    #[test]
    fn test_render_is_sourceable_bash() {
        let mut env = BTreeMap::new();
        env.insert("LINGLONG_APPID".to_string(), "org.test.hello".to_string());
        env.insert("WEIRD".to_string(), "it's $fine".to_string());
        let script = render(&env);
        assert!(script.contains("export LINGLONG_APPID='org.test.hello'"));
        assert!(script.contains(r"export WEIRD='it'\''s $fine'"));
    }
}
