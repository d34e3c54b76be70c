//! Restore sink that writes each nomination to disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use nomina_restore::{to_json, RestoreInfoTree};
use nomina_sync::error::SinkFault;

use crate::dispatcher::RestoreSink;
use crate::error::{io_err, DaemonError};

/// Writes `<out_dir>/<project-stem>.restore.json`, atomically.
#[derive(Debug, Clone)]
pub struct FileRestoreSink {
    out_dir: PathBuf,
}

impl FileRestoreSink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Output file for `project_path`. Host paths may use either separator.
    pub fn output_path(&self, project_path: &str) -> PathBuf {
        let file = project_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(project_path);
        let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
        let stem = if stem.is_empty() { "project" } else { stem };
        self.out_dir.join(format!("{stem}.restore.json"))
    }

    async fn write(&self, path: &Path, tree: &RestoreInfoTree) -> Result<(), DaemonError> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .map_err(|e| io_err(&self.out_dir, e))?;
        let json = to_json(tree)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| io_err(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| io_err(path, e))?;
        Ok(())
    }
}

#[async_trait]
impl RestoreSink for FileRestoreSink {
    async fn nominate(
        &self,
        project_path: &str,
        tree: &RestoreInfoTree,
        cancel: CancellationToken,
    ) -> Result<(), SinkFault> {
        if cancel.is_cancelled() {
            return Err(Box::new(DaemonError::Cancelled));
        }
        let path = self.output_path(project_path);
        self.write(&path, tree).await?;
        tracing::info!(project = %project_path, path = %path.display(), "restore info written");
        Ok(())
    }
}
