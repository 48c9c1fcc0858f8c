// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Integrity checks for an already-packed UAB file.

use std::path::Path;

use linyaps_digest::Digest;

use crate::error::{Error, Result};
use crate::meta::UabMetaInfo;
use crate::section;

/// Re-read `linglong.meta` and `linglong.bundle` out of `uab_path` and
/// confirm the bundle section's digest matches what the metadata claims.
pub async fn verify(uab_path: &Path) -> Result<UabMetaInfo> {
    let meta_bytes = section::dump(uab_path, "linglong.meta").await?;
    let meta: UabMetaInfo =
        serde_json::from_slice(&meta_bytes).map_err(|_| Error::MetaMissing)?;

    let bundle_bytes = section::dump(uab_path, &meta.sections.bundle).await?;
    let actual = Digest::from_reader(bundle_bytes.as_slice())?.to_string();
    if actual != meta.digest {
        return Err(Error::DigestMismatch {
            expected: meta.digest.clone(),
            actual,
        });
    }
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::UabSections;

    #[test]
    fn test_digest_mismatch_is_detected() {
        let expected = Digest::from_reader(b"bundle contents".as_slice())
            .unwrap()
            .to_string();
        let meta = UabMetaInfo {
            version: crate::meta::META_VERSION.to_string(),
            uuid: "11111111-1111-1111-1111-111111111111".to_string(),
            digest: expected.clone(),
            only_app: None,
            sections: UabSections::default(),
            layers: vec![],
        };
        let actual = Digest::from_reader(b"mismatched content".as_slice())
            .unwrap()
            .to_string();
        assert_ne!(meta.digest, actual);
        assert_eq!(meta.digest, expected);
    }
}
