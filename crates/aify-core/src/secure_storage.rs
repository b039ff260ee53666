/// Secure storage for API secret keys
///
/// Uses OS-backed secure storage:
/// - macOS/iOS: Keychain
/// - Linux: Secret Service API (gnome-keyring, KWallet, etc.)
/// - Windows: Credential Manager
use keyring::Entry;

const SERVICE_NAME: &str = "com.aify.client";

#[derive(Debug, thiserror::Error)]
pub enum SecureStorageError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("No secret key stored for {0}")]
    KeyNotFound(String),
}

/// Secret key of one API server, stored under the server's base URL
#[derive(Debug, Clone)]
pub struct SecureStorage {
    account: String,
}

impl SecureStorage {
    pub fn for_server(base_url: &str) -> Self {
        Self {
            account: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    fn entry(&self) -> Result<Entry, SecureStorageError> {
        Ok(Entry::new(SERVICE_NAME, &self.account)?)
    }

    pub fn set(&self, secret_key: &str) -> Result<(), SecureStorageError> {
        self.entry()?.set_password(secret_key)?;
        Ok(())
    }

    pub fn get(&self) -> Result<String, SecureStorageError> {
        match self.entry()?.get_password() {
            Ok(value) => Ok(value),
            Err(keyring::Error::NoEntry) => Err(SecureStorageError::KeyNotFound(self.account.clone())),
            Err(e) => Err(SecureStorageError::Keyring(e)),
        }
    }

    pub fn delete(&self) -> Result<(), SecureStorageError> {
        match self.entry()?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already deleted is success
            Err(e) => Err(SecureStorageError::Keyring(e)),
        }
    }

    pub fn exists(&self) -> bool {
        self.get().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_ignores_trailing_slash() {
        assert_eq!(
            SecureStorage::for_server("http://localhost:2000/").account(),
            "http://localhost:2000"
        );
    }

    #[test]
    #[ignore] // Requires an OS secret service
    fn test_secure_storage_roundtrip() {
        let storage = SecureStorage::for_server("http://aify-test.invalid");
        let _ = storage.delete();
        assert!(!storage.exists());

        storage.set("sk_test_12345").expect("Failed to set value");
        assert_eq!(storage.get().expect("Failed to get value"), "sk_test_12345");

        storage.delete().expect("Failed to delete value");
        assert!(matches!(storage.get(), Err(SecureStorageError::KeyNotFound(_))));
    }
}
