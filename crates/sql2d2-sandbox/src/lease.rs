//! Process-wide registry of listening addresses held by sandbox sessions

use crate::sandbox::SandboxError;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, OnceLock};

static CLAIMED: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

fn claimed() -> MutexGuard<'static, HashSet<String>> {
    CLAIMED
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exclusive claim on an address, released on drop
///
/// Claiming an address that is already held fails immediately instead of
/// waiting for the holder to finish.
#[derive(Debug)]
pub struct AddressLease {
    address: String,
}

impl AddressLease {
    pub fn claim(address: impl Into<String>) -> Result<Self, SandboxError> {
        let address = address.into();
        if !claimed().insert(address.clone()) {
            return Err(SandboxError::AddressInUse(address));
        }
        tracing::debug!(address = %address, "Claimed sandbox address");
        Ok(Self { address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether any live lease holds `address`
    pub fn is_claimed(address: &str) -> bool {
        claimed().contains(address)
    }
}

impl Drop for AddressLease {
    fn drop(&mut self) {
        claimed().remove(&self.address);
        tracing::debug!(address = %self.address, "Released sandbox address");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_fails_until_release() {
        let address = "lease-test:1";

        let lease = AddressLease::claim(address).unwrap();
        assert!(AddressLease::is_claimed(address));
        assert_eq!(
            AddressLease::claim(address).unwrap_err(),
            SandboxError::AddressInUse(address.to_string())
        );

        drop(lease);
        assert!(!AddressLease::is_claimed(address));
        assert!(AddressLease::claim(address).is_ok());
    }

    #[test]
    fn distinct_addresses_do_not_conflict() {
        let _a = AddressLease::claim("lease-test:2").unwrap();
        let _b = AddressLease::claim("lease-test:3").unwrap();
    }
}
