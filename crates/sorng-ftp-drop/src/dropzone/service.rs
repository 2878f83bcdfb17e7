//! Request service: one remote session per call, always closed.
//!
//! Each operation runs `authorize → open → (resolve | list | transfer) →
//! close`. Validation and shared-secret checks happen before any
//! connection is made.

use crate::dropzone::auth::AuthBridge;
use crate::dropzone::config::DropConfig;
use crate::dropzone::error::{DropError, DropResult};
use crate::dropzone::gateway::{RemoteSession, SessionGateway};
use crate::dropzone::lister::list_directory;
use crate::dropzone::naming::normalize_segment;
use crate::dropzone::orchestrator::transfer_batch;
use crate::dropzone::resolver::PathResolver;
use crate::dropzone::store::{Connector, RemoteStore};
use crate::dropzone::target::UploadTarget;
use crate::dropzone::types::*;
use std::sync::Arc;

pub struct DropService<C: Connector> {
    config: Arc<DropConfig>,
    gateway: SessionGateway<C>,
    auth: AuthBridge,
    resolver: PathResolver,
}

impl<C: Connector> DropService<C> {
    pub fn new(config: Arc<DropConfig>, connector: C) -> Self {
        let auth = AuthBridge::new(
            config.auth_mode,
            config.shared_secret.clone(),
            config.service_account(),
        );
        let resolver = PathResolver::new(
            config.base_directory.clone(),
            config.layout,
            config.existence,
            config.template_name.clone(),
        );
        Self {
            gateway: SessionGateway::new(connector),
            config,
            auth,
            resolver,
        }
    }

    pub fn config(&self) -> &DropConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        self.gateway.connector()
    }

    // ─── Operations ──────────────────────────────────────────────

    /// Check credentials. In remote mode this opens and closes a session.
    pub async fn verify(&self, caller: &Credentials) -> DropResult<VerifyModel> {
        let login = self.auth.login_for(caller)?;
        if self.auth.mode() == AuthMode::Remote {
            let session = self.gateway.open(&login).await?;
            session.close().await;
        }
        Ok(VerifyModel {
            identity: caller.identity.clone(),
            mode: self.auth.mode(),
        })
    }

    /// Sorted listing of `path`.
    pub async fn handle_view(&self, path: &str, caller: &Credentials) -> DropResult<ViewModel> {
        let login = self.auth.login_for(caller)?;
        let target = UploadTarget::parse(path)?;
        let remote = self.resolver.remote_path(&target, &caller.identity)?;

        let mut session = self.gateway.open(&login).await?;
        let result = self.view_in(&mut session, &caller.identity, &remote, &target).await;
        finish(session, "view", &target, result)
            .await
            .map(|entries| ViewModel {
                path: target.to_string(),
                parent: target.parent().map(|p| p.to_string()),
                entries,
            })
    }

    /// Create `new_name` inside `parent_path`.
    pub async fn handle_create(
        &self,
        parent_path: &str,
        new_name: &str,
        caller: &Credentials,
    ) -> DropResult<CreateModel> {
        let login = self.auth.login_for(caller)?;
        let parent = UploadTarget::parse(parent_path)?;
        let leaf = normalize_segment(new_name)?;
        if parent.is_root() && self.config.is_template(&leaf) {
            return Err(DropError::validation(format!("'{}' is a reserved name", leaf)));
        }
        let target = parent.child(leaf);
        self.resolver.remote_path(&target, &caller.identity)?;

        let mut session = self.gateway.open(&login).await?;
        let result = self.create_in(&mut session, &caller.identity, &target).await;
        finish(session, "create", &target, result)
            .await
            .map(|outcome| CreateModel {
                path: target.to_string(),
                outcome,
            })
    }

    /// Upload `files` into the existing folder `target_path`. Per-file
    /// failures are reported inside the model, not as an error.
    pub async fn handle_upload(
        &self,
        target_path: &str,
        files: Vec<UploadFile>,
        caller: &Credentials,
    ) -> DropResult<UploadModel> {
        let login = self.auth.login_for(caller)?;
        let target = UploadTarget::parse(target_path)?;
        let remote = self.resolver.remote_path(&target, &caller.identity)?;

        let mut session = self.gateway.open(&login).await?;
        let result = self.upload_in(&mut session, &caller.identity, &remote, files).await;
        finish(session, "upload", &target, result)
            .await
            .map(|results| UploadModel::new(target.to_string(), results))
    }

    // ─── Session-scoped steps ────────────────────────────────────

    async fn view_in(
        &self,
        session: &mut RemoteSession<C::Store>,
        identity: &str,
        remote: &str,
        target: &UploadTarget,
    ) -> DropResult<Vec<DirectoryEntry>> {
        self.resolver.ensure_personal_root(session, identity).await?;
        list_directory(session, remote, target.is_root(), self.resolver.template_name()).await
    }

    async fn create_in(
        &self,
        session: &mut RemoteSession<C::Store>,
        identity: &str,
        target: &UploadTarget,
    ) -> DropResult<EnsureOutcome> {
        self.resolver.ensure_personal_root(session, identity).await?;
        self.resolver.ensure_directory(session, target, identity).await
    }

    async fn upload_in(
        &self,
        session: &mut RemoteSession<C::Store>,
        identity: &str,
        remote: &str,
        files: Vec<UploadFile>,
    ) -> DropResult<Vec<TransferResult>> {
        self.resolver.ensure_personal_root(session, identity).await?;
        transfer_batch(session, remote, files).await
    }
}

/// Close the session and pass the operation result through.
async fn finish<S, T>(
    session: RemoteSession<S>,
    op: &str,
    target: &UploadTarget,
    result: DropResult<T>,
) -> DropResult<T>
where
    S: RemoteStore,
{
    let id = session.id.clone();
    session.close().await;
    match &result {
        Ok(_) => log::debug!("session {}: {} {} done", id, op, target),
        Err(e) => log::info!("session {}: {} {} failed: {}", id, op, target, e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dropzone::error::DropErrorKind;
    use crate::dropzone::memory::MemoryConnector;

    fn service(cfg: DropConfig) -> (MemoryConnector, DropService<MemoryConnector>) {
        let conn = MemoryConnector::new()
            .with_account("alice", "pw")
            .with_account("svc", "svc-pw");
        conn.add_dir("/_template");
        conn.add_dir("/_template/Fotos");
        conn.add_dir("/_template/Videos");
        (conn.clone(), DropService::new(Arc::new(cfg), conn))
    }

    fn alice() -> Credentials {
        Credentials::new("alice", "pw")
    }

    #[tokio::test]
    async fn create_top_level_clones_template() {
        let (conn, svc) = service(DropConfig::default());
        let model = svc.handle_create("/", "Team Alpha", &alice()).await.unwrap();
        assert_eq!(model.path, "/Team_Alpha");
        assert_eq!(model.outcome, EnsureOutcome::Created);
        assert!(conn.is_dir("/Team_Alpha/Fotos"));
        assert!(conn.is_dir("/Team_Alpha/Videos"));
        assert_eq!(conn.open_sessions(), 0);

        let again = svc.handle_create("/", "Team Alpha", &alice()).await.unwrap();
        assert_eq!(again.outcome, EnsureOutcome::Existing);
    }

    #[tokio::test]
    async fn create_under_missing_parent_is_not_found() {
        let (conn, svc) = service(DropConfig::default());
        let before = conn.snapshot();
        let err = svc.handle_create("/X", "new", &alice()).await.unwrap_err();
        assert_eq!(err.kind, DropErrorKind::NotFound);
        assert_eq!(conn.snapshot(), before);
        assert_eq!(conn.open_sessions(), 0);
    }

    #[tokio::test]
    async fn create_over_file_is_conflict() {
        let (conn, svc) = service(DropConfig::default());
        conn.add_file("/notes", b"n");
        let before = conn.snapshot();
        let err = svc.handle_create("/", "notes", &alice()).await.unwrap_err();
        assert_eq!(err.kind, DropErrorKind::NameConflict);
        assert_eq!(conn.snapshot(), before);
        assert_eq!(conn.open_sessions(), 0);
    }

    #[tokio::test]
    async fn create_rejects_bad_names_before_connecting() {
        let (conn, svc) = service(DropConfig {
            template_name: Some("vorlage".into()),
            ..Default::default()
        });
        for (parent, name) in [("/", ".."), ("/", "///"), ("rel", "x"), ("/a/../b", "x"), ("/", "vorlage ")] {
            let err = svc.handle_create(parent, name, &alice()).await.unwrap_err();
            assert_eq!(err.kind, DropErrorKind::Validation, "{} {}", parent, name);
        }
        assert_eq!(conn.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn upload_reports_per_file_results() {
        let (conn, svc) = service(DropConfig::default());
        conn.add_dir("/ev");
        let files = vec![
            UploadFile::from_bytes("a.pdf", b"pdf".to_vec()),
            UploadFile::from_bytes("", b"?".to_vec()),
        ];
        let model = svc.handle_upload("/ev", files, &alice()).await.unwrap();
        assert_eq!(model.folder, "/ev");
        assert_eq!((model.succeeded, model.failed), (1, 1));
        assert_eq!(model.results[0], TransferResult::success("a.pdf", "a.pdf", 3));
        assert_eq!(
            model.results[1],
            TransferResult::failure("", DropErrorKind::Validation, "no filename")
        );
        assert_eq!(conn.open_sessions(), 0);
    }

    #[tokio::test]
    async fn upload_into_missing_folder_fails_and_closes() {
        let (conn, svc) = service(DropConfig::default());
        let err = svc
            .handle_upload("/nope", vec![UploadFile::from_bytes("a", b"a".to_vec())], &alice())
            .await
            .unwrap_err();
        assert_eq!(err.kind, DropErrorKind::NotFound);
        assert_eq!(conn.sessions_opened(), 1);
        assert_eq!(conn.open_sessions(), 0);
    }

    #[tokio::test]
    async fn wrong_password_leaks_no_session() {
        let (conn, svc) = service(DropConfig::default());
        let err = svc
            .handle_view("/", &Credentials::new("alice", "bad"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, DropErrorKind::AuthFailed);
        assert_eq!(conn.open_sessions(), 0);
    }

    #[tokio::test]
    async fn shared_mode_rejects_without_connecting() {
        let (conn, svc) = service(DropConfig {
            auth_mode: AuthMode::Shared,
            shared_secret: Some("letmein".into()),
            service_user: "svc".into(),
            service_password: "svc-pw".into(),
            ..Default::default()
        });
        let err = svc
            .handle_view("/", &Credentials::new("guest", "nope"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, DropErrorKind::AuthFailed);
        assert_eq!(conn.sessions_opened(), 0);

        let ok = svc.handle_view("/", &Credentials::new("guest", "letmein")).await.unwrap();
        assert_eq!(ok.path, "/");
        assert_eq!(conn.sessions_opened(), 1);
        assert_eq!(conn.open_sessions(), 0);
        assert!(svc.verify(&Credentials::new("guest", "letmein")).await.is_ok());
        assert_eq!(conn.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn view_hides_template_only_at_root() {
        let (conn, svc) = service(DropConfig::default());
        conn.add_dir("/b");
        conn.add_file("/a.txt", b"a");
        let root = svc.handle_view("/", &alice()).await.unwrap();
        let names: Vec<&str> = root.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a.txt"]);
        assert_eq!(root.parent, None);

        let sub = svc.handle_view("/b", &alice()).await.unwrap();
        assert_eq!(sub.entries[0].kind, EntryKind::ParentDirectory);
        assert_eq!(sub.parent.as_deref(), Some("/"));
        assert_eq!(conn.open_sessions(), 0);
    }

    #[tokio::test]
    async fn per_user_layout_isolates_users() {
        let (conn, svc) = service(DropConfig {
            layout: LayoutMode::PerUser,
            ..Default::default()
        });
        let view = svc.handle_view("/", &alice()).await.unwrap();
        let names: Vec<&str> = view.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Fotos", "Videos"]);

        svc.handle_create("/", "Trip", &alice()).await.unwrap();
        let model = svc
            .handle_upload("/Trip", vec![UploadFile::from_bytes("x.jpg", b"jpg".to_vec())], &alice())
            .await
            .unwrap();
        assert_eq!(model.succeeded, 1);
        assert_eq!(conn.file("/alice/Trip/x.jpg").unwrap(), b"jpg");
        assert!(!conn.is_dir("/alice/Trip/Fotos"));
        assert_eq!(conn.open_sessions(), 0);
    }

    #[tokio::test]
    async fn unreachable_server_is_reported_as_auth_class() {
        let (conn, svc) = service(DropConfig::default());
        conn.set_unreachable(true);
        let err = svc.verify(&alice()).await.unwrap_err();
        assert_eq!(err.kind, DropErrorKind::Unreachable);
        assert!(err.is_auth());
    }
}
