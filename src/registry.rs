//! In-process handoff of exported assets.
//!
//! A conversion hands its asset to whoever downloads or previews it through a
//! revocable [`AssetHandle`]. The registry is an explicit value owned by the
//! caller; there is no global. At most one handle is live: issuing a new one
//! revokes the previous, so a stale preview can never resolve to an old asset.

use crate::pipeline::export::ExportedAsset;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const SCHEME: &str = "asset://img2glb/";

/// Opaque reference to a registered asset, `asset://img2glb/<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetHandle(String);

impl AssetHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
pub struct AssetRegistry {
    issued: u64,
    live: Option<(AssetHandle, Arc<ExportedAsset>)>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `asset`, revoking whatever handle was live before.
    pub fn issue(&mut self, asset: ExportedAsset) -> AssetHandle {
        self.revoke_all();
        self.issued += 1;
        let handle = AssetHandle(format!("{SCHEME}{}", self.issued));
        debug!("Issued {} ({} bytes)", handle, asset.bytes.len());
        self.live = Some((handle.clone(), Arc::new(asset)));
        handle
    }

    /// The asset behind `handle`, if it is still live.
    pub fn resolve(&self, handle: &AssetHandle) -> Option<Arc<ExportedAsset>> {
        match &self.live {
            Some((live, asset)) if live == handle => Some(Arc::clone(asset)),
            _ => None,
        }
    }

    /// Revoke `handle`. Returns false if it was not live.
    pub fn revoke(&mut self, handle: &AssetHandle) -> bool {
        if self.live.as_ref().is_some_and(|(live, _)| live == handle) {
            self.live = None;
            debug!("Revoked {}", handle);
            true
        } else {
            false
        }
    }

    pub fn revoke_all(&mut self) {
        if let Some((handle, _)) = self.live.take() {
            debug!("Revoked {}", handle);
        }
    }

    pub fn current(&self) -> Option<&AssetHandle> {
        self.live.as_ref().map(|(h, _)| h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;

    fn asset(n: u8) -> ExportedAsset {
        ExportedAsset {
            bytes: vec![n; 4],
            format: OutputFormat::Binary,
            segment_count: 1,
            has_backdrop: false,
        }
    }

    #[test]
    fn issuing_revokes_the_previous_handle() {
        let mut reg = AssetRegistry::new();
        let first = reg.issue(asset(1));
        assert_eq!(first.as_str(), "asset://img2glb/1");
        assert_eq!(reg.resolve(&first).unwrap().bytes, vec![1; 4]);

        let second = reg.issue(asset(2));
        assert_ne!(first, second);
        assert!(reg.resolve(&first).is_none());
        assert_eq!(reg.resolve(&second).unwrap().bytes, vec![2; 4]);
        assert_eq!(reg.current(), Some(&second));
    }

    #[test]
    fn revoke_is_idempotent() {
        let mut reg = AssetRegistry::new();
        let h = reg.issue(asset(1));
        assert!(reg.revoke(&h));
        assert!(!reg.revoke(&h));
        assert!(reg.resolve(&h).is_none());
        assert!(reg.current().is_none());
    }
}
