//! Transfer Orchestrator: stage and STOR a batch, one file at a time.

use crate::dropzone::error::{DropError, DropErrorKind, DropResult};
use crate::dropzone::gateway::RemoteSession;
use crate::dropzone::naming::sanitize_filename;
use crate::dropzone::store::RemoteStore;
use crate::dropzone::types::{TransferOutcome, TransferResult, UploadFile};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Upload `files` into `remote_dir`.
///
/// The directory must exist; otherwise the whole batch fails with
/// `NotFound`. After that every file gets exactly one result, in input
/// order, and a failing file never stops the ones after it.
pub async fn transfer_batch<S: RemoteStore>(
    session: &mut RemoteSession<S>,
    remote_dir: &str,
    files: Vec<UploadFile>,
) -> DropResult<Vec<TransferResult>> {
    session.enter(remote_dir).await?;

    let staging = tempfile::Builder::new()
        .prefix("ftp-drop-")
        .tempdir()
        .map_err(|e| DropError::io(format!("cannot create staging area: {}", e)))?;

    let mut results = Vec::with_capacity(files.len());
    for (index, file) in files.into_iter().enumerate() {
        let result = transfer_one(session, staging.path(), index, file).await;
        match &result.outcome {
            TransferOutcome::Success { remote_name, bytes } => {
                log::info!(
                    "session {}: stored {}/{} ({} bytes)",
                    session.id,
                    remote_dir,
                    remote_name,
                    bytes
                )
            }
            TransferOutcome::Failure { kind, message } => log::warn!(
                "session {}: '{}' not stored ({:?}): {}",
                session.id,
                result.original_filename,
                kind,
                message
            ),
        }
        results.push(result);
    }

    if let Err(e) = staging.close() {
        log::warn!("staging area not removed: {}", e);
    }
    Ok(results)
}

async fn transfer_one<S: RemoteStore>(
    session: &mut RemoteSession<S>,
    staging: &Path,
    index: usize,
    mut file: UploadFile,
) -> TransferResult {
    let original = file.filename.clone();
    if original.is_empty() {
        return TransferResult::failure(original, DropErrorKind::Validation, "no filename");
    }
    let remote_name = match sanitize_filename(&original) {
        Ok(n) => n,
        Err(e) => return TransferResult::failure(original, e.kind, e.message),
    };

    // Index prefix keeps two uploads that sanitize to the same name apart.
    let staged_path = staging.join(format!("{:04}-{}", index, remote_name));
    if let Err(e) = stage(&mut file, &staged_path).await {
        return TransferResult::failure(original, DropErrorKind::Io, e.to_string());
    }

    let mut staged = match File::open(&staged_path).await {
        Ok(f) => f,
        Err(e) => return TransferResult::failure(original, DropErrorKind::Io, e.to_string()),
    };
    match session.store(&remote_name, &mut staged).await {
        Ok(bytes) => TransferResult::success(original, remote_name, bytes),
        Err(e) => TransferResult::failure(original, e.kind, e.message),
    }
}

async fn stage(file: &mut UploadFile, path: &Path) -> std::io::Result<u64> {
    let mut out = File::create(path).await?;
    let n = tokio::io::copy(&mut file.content, &mut out).await?;
    out.flush().await?;
    Ok(n)
}
