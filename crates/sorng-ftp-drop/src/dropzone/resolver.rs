//! Path Resolver & Directory Ensurer.
//!
//! Maps user paths onto the remote tree and creates the leaf directory of
//! a target when it is missing. Ancestors are never created implicitly,
//! apart from the personal directory in the per-user layout.

use crate::dropzone::error::{DropError, DropResult};
use crate::dropzone::gateway::RemoteSession;
use crate::dropzone::naming::normalize_segment;
use crate::dropzone::store::RemoteStore;
use crate::dropzone::target::{join_remote, UploadTarget};
use crate::dropzone::types::{EnsureOutcome, ExistenceStrategy, LayoutMode};

/// What a name in a directory listing refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    base_directory: String,
    layout: LayoutMode,
    strategy: ExistenceStrategy,
    template_name: Option<String>,
}

impl PathResolver {
    pub fn new(
        base_directory: impl Into<String>,
        layout: LayoutMode,
        strategy: ExistenceStrategy,
        template_name: Option<String>,
    ) -> Self {
        Self {
            base_directory: base_directory.into(),
            layout,
            strategy,
            template_name,
        }
    }

    pub fn template_name(&self) -> Option<&str> {
        self.template_name.as_deref()
    }

    /// Personal directory name for `identity`, `None` outside the per-user layout.
    pub fn personal_segment(&self, identity: &str) -> DropResult<Option<String>> {
        match self.layout {
            LayoutMode::Hierarchical => Ok(None),
            LayoutMode::PerUser => normalize_segment(identity).map(Some).map_err(|_| {
                DropError::auth_failed("this login cannot be mapped to a personal folder")
            }),
        }
    }

    /// Absolute remote path of `target` for the caller.
    pub fn remote_path(&self, target: &UploadTarget, identity: &str) -> DropResult<String> {
        let personal = self.personal_segment(identity)?;
        Ok(join_remote(
            &self.base_directory,
            personal
                .as_deref()
                .into_iter()
                .chain(target.segments().iter().map(String::as_str)),
        ))
    }

    /// In the per-user layout, make sure the caller's personal directory
    /// exists below the base directory. No-op otherwise.
    pub async fn ensure_personal_root<S: RemoteStore>(
        &self,
        session: &mut RemoteSession<S>,
        identity: &str,
    ) -> DropResult<()> {
        let Some(personal) = self.personal_segment(identity)? else {
            return Ok(());
        };
        let outcome = self
            .ensure_in(session, &self.base_directory, &personal, true)
            .await?;
        if outcome == EnsureOutcome::Created {
            log::info!("created personal folder '{}' for {}", personal, identity);
        }
        Ok(())
    }

    /// Make `target` exist as a directory and leave the session inside it.
    ///
    /// The parent must already exist. An existing directory of the same
    /// name is reused; an existing file is a conflict.
    pub async fn ensure_directory<S: RemoteStore>(
        &self,
        session: &mut RemoteSession<S>,
        target: &UploadTarget,
        identity: &str,
    ) -> DropResult<EnsureOutcome> {
        let (Some(parent), Some(leaf)) = (target.parent(), target.leaf()) else {
            // The root always exists; just enter it.
            session.enter(&self.remote_path(target, identity)?).await?;
            return Ok(EnsureOutcome::Existing);
        };
        let parent_remote = self.remote_path(&parent, identity)?;
        let top_level = parent.is_root() && self.layout == LayoutMode::Hierarchical;
        self.ensure_in(session, &parent_remote, leaf, top_level).await
    }

    async fn ensure_in<S: RemoteStore>(
        &self,
        session: &mut RemoteSession<S>,
        parent_remote: &str,
        leaf: &str,
        clone_template: bool,
    ) -> DropResult<EnsureOutcome> {
        session.enter(parent_remote).await?;
        let leaf_remote = join_remote(parent_remote, [leaf]);

        match self.lookup(session, leaf).await? {
            Some(NodeKind::Directory) => {
                session.enter(&leaf_remote).await?;
                Ok(EnsureOutcome::Existing)
            }
            Some(NodeKind::File) => Err(DropError::name_conflict(format!(
                "cannot create directory '{}', a file exists with that name",
                leaf
            ))),
            None => {
                session.make_dir(leaf).await?;
                log::info!("session {}: created {}", session.id, leaf_remote);
                if clone_template {
                    self.clone_template(session, &leaf_remote).await;
                }
                session.enter(&leaf_remote).await?;
                Ok(EnsureOutcome::Created)
            }
        }
    }

    /// Look `name` up in the session's current directory.
    pub async fn lookup<S: RemoteStore>(
        &self,
        session: &mut RemoteSession<S>,
        name: &str,
    ) -> DropResult<Option<NodeKind>> {
        let names = self.scan_current(session).await?;
        Ok(names.into_iter().find(|(n, _)| n == name).map(|(_, k)| k))
    }

    /// (name, kind) pairs of the current directory per the configured strategy.
    async fn scan_current<S: RemoteStore>(
        &self,
        session: &mut RemoteSession<S>,
    ) -> DropResult<Vec<(String, NodeKind)>> {
        let structured = match self.strategy {
            ExistenceStrategy::Structured => true,
            ExistenceStrategy::ListingScan => false,
            ExistenceStrategy::Auto => session.supports_structured_listing(),
        };
        if structured {
            Ok(session
                .list_structured()
                .await?
                .into_iter()
                .map(|e| {
                    let kind = if e.is_dir() {
                        NodeKind::Directory
                    } else {
                        NodeKind::File
                    };
                    (e.name, kind)
                })
                .collect())
        } else {
            Ok(session
                .list_lines()
                .await?
                .iter()
                .filter_map(|l| scan_listing_line(l))
                .collect())
        }
    }

    /// Recreate the template's subdirectories (one level) inside `new_dir`.
    /// Problems are logged and skipped.
    async fn clone_template<S: RemoteStore>(&self, session: &mut RemoteSession<S>, new_dir: &str) {
        let Some(template) = self.template_name.as_deref() else {
            return;
        };
        let template_remote = join_remote(&self.base_directory, [template]);

        let subdirs: Vec<String> = match session.enter(&template_remote).await {
            Ok(()) => match self.scan_current(session).await {
                Ok(names) => names
                    .into_iter()
                    .filter(|(n, k)| *k == NodeKind::Directory && n != "." && n != "..")
                    .map(|(n, _)| n)
                    .collect(),
                Err(e) => {
                    log::warn!("template {} could not be listed: {}", template_remote, e);
                    return;
                }
            },
            Err(e) => {
                log::warn!("template {} unavailable: {}", template_remote, e);
                return;
            }
        };

        if let Err(e) = session.enter(new_dir).await {
            log::warn!("could not re-enter {} to clone template: {}", new_dir, e);
            return;
        }
        for sub in subdirs {
            match session.make_dir(&sub).await {
                Ok(()) => log::debug!("template: created {}/{}", new_dir, sub),
                Err(e) => log::warn!("template: could not create {}/{}: {}", new_dir, sub, e),
            }
        }
    }
}

/// Parse one raw LIST line: the first token's leading `d`/`D` marks a
/// directory, the last token is the name. Blank and `total` lines yield `None`.
pub fn scan_listing_line(line: &str) -> Option<(String, NodeKind)> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    if first.eq_ignore_ascii_case("total") {
        return None;
    }
    let name = tokens.last().unwrap_or(first);
    let kind = if first.starts_with(['d', 'D']) {
        NodeKind::Directory
    } else {
        NodeKind::File
    };
    Some((name.to_string(), kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dropzone::error::DropErrorKind;
    use crate::dropzone::gateway::SessionGateway;
    use crate::dropzone::memory::MemoryConnector;
    use crate::dropzone::types::Credentials;

    fn setup(structured: bool) -> (MemoryConnector, SessionGateway<MemoryConnector>) {
        let conn = MemoryConnector::new()
            .with_account("u", "p")
            .with_structured_listing(structured);
        conn.add_dir("/_template");
        conn.add_dir("/_template/Fotos");
        conn.add_dir("/_template/Dokumente");
        conn.add_file("/_template/readme.txt", b"x");
        (conn.clone(), SessionGateway::new(conn))
    }

    fn resolver(strategy: ExistenceStrategy) -> PathResolver {
        PathResolver::new("/", LayoutMode::Hierarchical, strategy, Some("_template".into()))
    }

    #[test]
    fn scan_contract() {
        assert_eq!(
            scan_listing_line("drwxr-xr-x 2 ftp ftp 4096 Jan 01 12:00 events"),
            Some(("events".into(), NodeKind::Directory))
        );
        assert_eq!(
            scan_listing_line("-rw-r--r-- 1 ftp ftp 10 Jan 01 12:00 a.pdf"),
            Some(("a.pdf".into(), NodeKind::File))
        );
        assert_eq!(
            scan_listing_line("Drw 1 x y 0 Jan 1 1:00 Up"),
            Some(("Up".into(), NodeKind::Directory))
        );
        assert_eq!(scan_listing_line("total 12"), None);
        assert_eq!(scan_listing_line("   "), None);
    }

    #[test]
    fn remote_paths_follow_layout() {
        let t = UploadTarget::parse("/a/b").unwrap();
        let flat = PathResolver::new("/srv/drop", LayoutMode::Hierarchical, ExistenceStrategy::Auto, None);
        assert_eq!(flat.remote_path(&t, "bob").unwrap(), "/srv/drop/a/b");
        let per_user = PathResolver::new("/srv/drop", LayoutMode::PerUser, ExistenceStrategy::Auto, None);
        assert_eq!(per_user.remote_path(&t, "Jörg M").unwrap(), "/srv/drop/Joerg_M/a/b");
        assert_eq!(
            per_user.remote_path(&t, "..").unwrap_err().kind,
            DropErrorKind::AuthFailed
        );
    }

    #[tokio::test]
    async fn top_level_create_clones_template() {
        for strategy in [ExistenceStrategy::Structured, ExistenceStrategy::ListingScan] {
            let (conn, gw) = setup(true);
            let r = resolver(strategy);
            let mut s = gw.open(&Credentials::new("u", "p")).await.unwrap();
            let t = UploadTarget::root().child("Team_Alpha");
            assert_eq!(r.ensure_directory(&mut s, &t, "u").await.unwrap(), EnsureOutcome::Created);
            assert_eq!(s.cwd(), Some("/Team_Alpha"));
            s.close().await;

            assert!(conn.is_dir("/Team_Alpha/Fotos"));
            assert!(conn.is_dir("/Team_Alpha/Dokumente"));
            assert!(conn.node("/Team_Alpha/readme.txt").is_none());
        }
    }

    #[tokio::test]
    async fn nested_create_does_not_clone() {
        let (conn, gw) = setup(true);
        conn.add_dir("/events");
        let r = resolver(ExistenceStrategy::Auto);
        let mut s = gw.open(&Credentials::new("u", "p")).await.unwrap();
        let t = UploadTarget::parse("/events/day1").unwrap();
        assert_eq!(r.ensure_directory(&mut s, &t, "u").await.unwrap(), EnsureOutcome::Created);
        s.close().await;
        assert!(conn.is_dir("/events/day1"));
        assert!(!conn.is_dir("/events/day1/Fotos"));
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let (conn, gw) = setup(false);
        let r = resolver(ExistenceStrategy::Auto);
        let t = UploadTarget::parse("/x").unwrap();
        let mut s = gw.open(&Credentials::new("u", "p")).await.unwrap();
        assert_eq!(r.ensure_directory(&mut s, &t, "u").await.unwrap(), EnsureOutcome::Created);
        let after_first = conn.snapshot();
        assert_eq!(r.ensure_directory(&mut s, &t, "u").await.unwrap(), EnsureOutcome::Existing);
        s.close().await;
        assert_eq!(conn.snapshot(), after_first);
    }

    #[tokio::test]
    async fn missing_parent_is_not_found_without_mutation() {
        let (conn, gw) = setup(true);
        let r = resolver(ExistenceStrategy::Auto);
        let before = conn.snapshot();
        let mut s = gw.open(&Credentials::new("u", "p")).await.unwrap();
        let t = UploadTarget::parse("/X/new").unwrap();
        let err = r.ensure_directory(&mut s, &t, "u").await.unwrap_err();
        s.close().await;
        assert_eq!(err.kind, DropErrorKind::NotFound);
        assert_eq!(conn.snapshot(), before);
        assert!(conn.mutations().is_empty());
    }

    #[tokio::test]
    async fn file_with_same_name_conflicts() {
        let (conn, gw) = setup(true);
        conn.add_file("/report", b"data");
        let r = resolver(ExistenceStrategy::Auto);
        let before = conn.snapshot();
        let mut s = gw.open(&Credentials::new("u", "p")).await.unwrap();
        let err = r
            .ensure_directory(&mut s, &UploadTarget::parse("/report").unwrap(), "u")
            .await
            .unwrap_err();
        s.close().await;
        assert_eq!(err.kind, DropErrorKind::NameConflict);
        assert_eq!(conn.snapshot(), before);
    }

    #[tokio::test]
    async fn template_failures_do_not_fail_create() {
        let (conn, gw) = setup(true);
        conn.fail_mkdir_of("/Neu/Fotos");
        let r = resolver(ExistenceStrategy::Auto);
        let mut s = gw.open(&Credentials::new("u", "p")).await.unwrap();
        let t = UploadTarget::parse("/Neu").unwrap();
        assert_eq!(r.ensure_directory(&mut s, &t, "u").await.unwrap(), EnsureOutcome::Created);
        s.close().await;
        assert!(conn.is_dir("/Neu/Dokumente"));
        assert!(!conn.is_dir("/Neu/Fotos"));

        let no_template = PathResolver::new("/", LayoutMode::Hierarchical, ExistenceStrategy::Auto, Some("missing".into()));
        let mut s = gw.open(&Credentials::new("u", "p")).await.unwrap();
        let t = UploadTarget::parse("/Other").unwrap();
        assert_eq!(no_template.ensure_directory(&mut s, &t, "u").await.unwrap(), EnsureOutcome::Created);
        assert_eq!(s.cwd(), Some("/Other"));
        s.close().await;
    }

    #[tokio::test]
    async fn personal_root_created_once_with_template() {
        let (conn, gw) = setup(true);
        let r = PathResolver::new("/", LayoutMode::PerUser, ExistenceStrategy::Auto, Some("_template".into()));
        let mut s = gw.open(&Credentials::new("u", "p")).await.unwrap();
        r.ensure_personal_root(&mut s, "Anna Schmidt").await.unwrap();
        r.ensure_personal_root(&mut s, "Anna Schmidt").await.unwrap();
        let t = UploadTarget::parse("/trip").unwrap();
        assert_eq!(r.ensure_directory(&mut s, &t, "Anna Schmidt").await.unwrap(), EnsureOutcome::Created);
        s.close().await;
        assert!(conn.is_dir("/Anna_Schmidt/Fotos"));
        assert!(conn.is_dir("/Anna_Schmidt/trip"));
        assert!(!conn.is_dir("/Anna_Schmidt/trip/Fotos"));
    }
}
