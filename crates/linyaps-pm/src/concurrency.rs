// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Per-`(reference, module)` mutual exclusion (§4.4, §5): distinct
//! references run concurrently, but a second request targeting a
//! reference/module pair already in flight is rejected outright rather
//! than queued.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

#[derive(Clone, Default)]
pub struct ActiveTargets {
    inner: Arc<Mutex<HashSet<(String, String)>>>,
}

/// Released automatically when dropped, whether the operation
/// succeeded, failed, or was canceled.
pub struct TargetGuard {
    targets: ActiveTargets,
    key: (String, String),
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        self.targets.inner.lock().unwrap().remove(&self.key);
    }
}

impl ActiveTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, reference_id: &str, module: &str) -> Result<TargetGuard> {
        let key = (reference_id.to_string(), module.to_string());
        let mut set = self.inner.lock().unwrap();
        if !set.insert(key.clone()) {
            return Err(Error::TargetBusy {
                reference: reference_id.to_string(),
                module: module.to_string(),
            });
        }
        drop(set);
        Ok(TargetGuard {
            targets: self.clone(),
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_of_same_target_fails() {
        let targets = ActiveTargets::new();
        let _first = targets.acquire("org.test.hello", "binary").unwrap();
        assert!(matches!(
            targets.acquire("org.test.hello", "binary"),
            Err(Error::TargetBusy { .. })
        ));
    }

    #[test]
    fn test_distinct_references_do_not_conflict() {
        let targets = ActiveTargets::new();
        let _first = targets.acquire("org.test.hello", "binary").unwrap();
        assert!(targets.acquire("org.test.other", "binary").is_ok());
    }

    #[test]
    fn test_target_is_released_on_drop() {
        let targets = ActiveTargets::new();
        {
            let _guard = targets.acquire("org.test.hello", "binary").unwrap();
        }
        assert!(targets.acquire("org.test.hello", "binary").is_ok());
    }
}
