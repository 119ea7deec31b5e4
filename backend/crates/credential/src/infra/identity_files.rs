//! Identity Files
//!
//! One `{name}.json` file per identity, each a flat object of secrets.
//! Numbers and booleans are accepted and kept as their JSON text.

use crate::domain::entities::Identity;
use crate::domain::repository::IdentitySource;
use crate::domain::value_objects::IdentityFileName;
use crate::error::{CredentialError, CredentialResult};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

/// Identity files in a local directory
#[derive(Debug, Clone)]
pub struct FileIdentitySource {
    dir: PathBuf,
}

impl FileIdentitySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> CredentialResult<PathBuf> {
        let name = IdentityFileName::parse(name)?;
        Ok(self.dir.join(name.file_name()))
    }

    async fn load_file(path: &Path, source_name: &str) -> CredentialResult<Identity> {
        let raw = tokio::fs::read(path).await?;
        let secrets = parse_secrets(&raw).map_err(|reason| {
            CredentialError::InvalidIdentity(format!("{source_name}: {reason}"))
        })?;
        Identity::from_secrets(source_name, secrets)
    }
}

/// Parse a flat JSON object into a secret map
fn parse_secrets(raw: &[u8]) -> Result<BTreeMap<String, String>, String> {
    let value: serde_json::Value = serde_json::from_slice(raw).map_err(|e| e.to_string())?;
    let object = value
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;

    let mut secrets = BTreeMap::new();
    for (key, value) in object {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Null => continue,
            _ => return Err(format!("secret {key} is not a scalar")),
        };
        secrets.insert(key.clone(), text);
    }
    Ok(secrets)
}

impl IdentitySource for FileIdentitySource {
    async fn load_all(&self) -> CredentialResult<Vec<Identity>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(dir = %self.dir.display(), "Identity directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut identities = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(source_name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match Self::load_file(&path, source_name).await {
                Ok(identity) => identities.push(identity),
                Err(e) => {
                    tracing::warn!(
                        file = %path.display(),
                        error = %e,
                        "Skipping unreadable identity file"
                    );
                }
            }
        }

        tracing::debug!(
            dir = %self.dir.display(),
            count = identities.len(),
            "Identity files loaded"
        );
        Ok(identities)
    }

    async fn write(&self, name: &str, secrets: &BTreeMap<String, String>) -> CredentialResult<()> {
        let path = self.path_for(name)?;
        let body = serde_json::to_vec_pretty(secrets)
            .map_err(|e| CredentialError::Internal(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir).await?;

        // Readers never see a half-written file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, name: &str) -> CredentialResult<bool> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_load_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("alice.json"),
            r#"{"sessionid": "s-a", "ds_user_id": 111, "csrftoken": "c"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("nosession.json"), r#"{"csrftoken": "c"}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = FileIdentitySource::new(dir.path());
        let identities = source.load_all().await.unwrap();

        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].id.as_str(), "111");
        assert_eq!(identities[0].source_name, "alice");
        assert_eq!(identities[0].secret("csrftoken"), Some("c"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileIdentitySource::new(dir.path().join("absent"));
        assert!(source.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileIdentitySource::new(dir.path().join("cookies"));

        source
            .write("bob", &secrets(&[("sessionid", "s-b")]))
            .await
            .unwrap();
        assert!(dir.path().join("cookies/bob.json").exists());
        assert_eq!(source.load_all().await.unwrap().len(), 1);

        assert!(source.remove("bob.json").await.unwrap());
        assert!(!source.remove("bob").await.unwrap());
        assert!(source.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileIdentitySource::new(dir.path());
        let err = source
            .write("../escape", &secrets(&[("sessionid", "s")]))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::InvalidIdentity(_)));
    }

    #[test]
    fn test_parse_secrets_rejects_nested_values() {
        assert!(parse_secrets(br#"{"sessionid": {"a": 1}}"#).is_err());
        assert!(parse_secrets(br#"["sessionid"]"#).is_err());
        let parsed = parse_secrets(br#"{"sessionid": "x", "flag": true, "gone": null}"#).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["flag"], "true");
    }
}
