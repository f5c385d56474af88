//! Locating a user's uploaded file on disk.
//!
//! Layout: `<assets_dir>/<sanitized username>/<category>/<server filename>`.
//! The server filename comes from the client, so it must stay a single
//! plain path component and the resolved file must remain under the user's
//! own folder.

use std::path::{Component, Path, PathBuf};

use fusedchat_proto::files::classify_filename;
use tracing::{error, warn};

use crate::error::{GatewayError, GatewayResult};

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_for_path(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    pub fn user_dir(&self, username: &str) -> PathBuf {
        let name = if username.is_empty() {
            "unknown_user".to_string()
        } else {
            sanitize_for_path(username)
        };
        self.root.join(name)
    }

    /// Absolute path of an existing upload. `document_name` picks the
    /// category subfolder and names the file in the 404 message.
    pub async fn resolve(
        &self,
        username: &str,
        document_name: &str,
        server_filename: &str,
    ) -> GatewayResult<PathBuf> {
        if !is_plain_file_name(server_filename) {
            warn!("Rejected server filename {:?}", server_filename);
            return Err(GatewayError::Validation("Invalid file name.".to_string()));
        }

        let user_dir = self.user_dir(username);
        let candidate = user_dir
            .join(classify_filename(document_name).subfolder())
            .join(server_filename);

        let not_found = || {
            GatewayError::NotFound(format!(
                "File '{}' could not be located on the server.",
                document_name
            ))
        };

        let is_file = tokio::fs::metadata(&candidate)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            error!("File not found at constructed path: {:?}", candidate);
            return Err(not_found());
        }

        // Symlinks inside the user folder must not lead out of it.
        let resolved = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(|_| not_found())?;
        let user_root = tokio::fs::canonicalize(&user_dir)
            .await
            .map_err(|_| not_found())?;
        if !resolved.starts_with(&user_root) {
            warn!("{:?} resolves outside {:?}", candidate, user_root);
            return Err(not_found());
        }

        Ok(resolved)
    }
}
