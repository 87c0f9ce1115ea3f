//! The transactional node-tree store (spec §4.B).
//!
//! Generalizes the teacher's `DatabaseService` (a single `nodes` table under
//! libsql with explicit `BEGIN`/`COMMIT`/`ROLLBACK`) to the three-table
//! schema in [`super::schema`]. Every public operation here opens its own
//! transaction and either commits or rolls back before returning, exactly
//! like `DatabaseService::db_batch_create_nodes`.

use std::path::Path;
use std::sync::Arc;

use libsql::{Builder, Database};

use crate::db::error::DatabaseError;
use crate::db::schema;
use crate::error::VoSpaceError;
use crate::identity::Identity;
use crate::model::node::{Capability, ChildRef, DataNodeFields, Node, NodeHeader, NodeType, View};
use crate::model::path::{NodePath, NodeUri};
use crate::model::property::Property;

/// The `detail` query option on a directory read (spec §4.B / §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    Min,
    Max,
    Properties,
}

impl Detail {
    pub fn parse(raw: &str) -> Result<Self, VoSpaceError> {
        match raw {
            "min" => Ok(Detail::Min),
            "max" => Ok(Detail::Max),
            "properties" => Ok(Detail::Properties),
            other => Err(VoSpaceError::InvalidArgument(format!("unknown detail: {other}"))),
        }
    }
}

/// The transactional node-tree store.
#[derive(Clone)]
pub struct MetadataStore {
    db: Arc<Database>,
    space_name: String,
}

/// Raw columns of a `nodes` row, before being assembled into a [`Node`].
struct NodeRow {
    node_type: NodeType,
    busy: bool,
    owner: Option<String>,
    link_target: Option<String>,
    accepts: Vec<View>,
    provides: Vec<View>,
    capabilities: Vec<Capability>,
}

impl MetadataStore {
    /// Open (creating if absent) the database at `db_path`, initialize the
    /// schema, and ensure the root container exists.
    pub async fn new(db_path: &Path, space_name: impl Into<String>) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::InitializationFailed(e.to_string()))?;
            }
        }
        let db = Builder::new_local(db_path)
            .build()
            .await
            .map_err(DatabaseError::ConnectionFailed)?;
        let store = MetadataStore { db: Arc::new(db), space_name: space_name.into() };
        let conn = store.connect_with_timeout().await?;
        schema::initialize(&conn).await?;
        store.ensure_root(&conn).await?;
        Ok(store)
    }

    pub fn space_name(&self) -> &str {
        &self.space_name
    }

    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::ConnectionFailed)
    }

    /// Use in every async operation (see the teacher's `connect_with_timeout`
    /// doc comment for why a plain `connect()` is unsafe across `.await`).
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;
        conn.execute("PRAGMA busy_timeout = 5000", ())
            .await
            .map_err(|e| DatabaseError::sql("set busy timeout", e))?;
        Ok(conn)
    }

    async fn ensure_root(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        let existing = self.load_row(conn, "").await?;
        if existing.is_none() {
            conn.execute(
                "INSERT INTO nodes (path, node_type, busy, owner) VALUES ('', ?, 0, NULL)",
                (NodeType::ContainerNode.xml_tag(),),
            )
            .await
            .map_err(|e| DatabaseError::sql("insert root container", e))?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // create
    // -----------------------------------------------------------------

    pub async fn create(&self, node: Node, identity: &Identity) -> Result<Node, VoSpaceError> {
        let path = node.path().clone();
        if path.is_root() {
            return Err(VoSpaceError::DuplicateNode("root container already exists".into()));
        }

        self.with_retry(|| async {
            let conn = self.connect_with_timeout().await?;
            begin(&conn).await?;

            match self.create_inner(&conn, node.clone(), identity).await {
                Ok(created) => {
                    commit(&conn).await?;
                    Ok(created)
                }
                Err(e) => {
                    rollback(&conn).await;
                    Err(e)
                }
            }
        })
        .await
    }

    async fn create_inner(
        &self,
        conn: &libsql::Connection,
        node: Node,
        identity: &Identity,
    ) -> Result<Node, VoSpaceError> {
        let path = node.path().clone();

        for ancestor in path.strict_ancestors() {
            let Some(row) = self.load_row(conn, &ancestor.as_str()).await? else {
                return Err(VoSpaceError::ContainerDoesNotExist(format!(
                    "missing ancestor: {ancestor}"
                )));
            };
            if row.node_type == NodeType::LinkNode {
                return Err(VoSpaceError::LinkFound(format!("link in path: {ancestor}")));
            }
        }

        let parent_path = path.parent().expect("non-root path has a parent");
        let parent = self
            .load_row(conn, &parent_path.as_str())
            .await?
            .ok_or_else(|| VoSpaceError::ContainerDoesNotExist(parent_path.to_string()))?;
        if parent.node_type != NodeType::ContainerNode {
            return Err(VoSpaceError::ContainerDoesNotExist(parent_path.to_string()));
        }
        if let Some(owner) = &parent.owner {
            if owner != identity.as_str() {
                return Err(VoSpaceError::PermissionDenied(format!(
                    "identity {identity} may not create under {parent_path}"
                )));
            }
        }

        if self.load_row(conn, &path.as_str()).await?.is_some() {
            return Err(VoSpaceError::DuplicateNode(path.to_string()));
        }

        if let Some(target) = node.link_target() {
            if let Ok(target_uri) = NodeUri::parse(target) {
                if target_uri.space == self.space_name && target_uri.path.is_self_or_ancestor_of(&path) {
                    return Err(VoSpaceError::LinkFound(format!(
                        "link target creates a cycle: {target}"
                    )));
                }
            }
        }

        let data_fields = node.data_fields().cloned().unwrap_or_default();
        conn.execute(
            "INSERT INTO nodes (path, node_type, busy, owner, link_target, accepts_json, provides_json, capabilities_json)
             VALUES (?, ?, 0, ?, ?, ?, ?, ?)",
            (
                path.as_str(),
                node.node_type().xml_tag(),
                identity.as_str().to_string(),
                node.link_target().map(|s| s.to_string()),
                json_encode(&data_fields.accepts)?,
                json_encode(&data_fields.provides)?,
                json_encode(&node.header().capabilities)?,
            ),
        )
        .await
        .map_err(|e| VoSpaceError::from(DatabaseError::sql("insert node", e)))?;

        for prop in node.properties() {
            if prop.is_delete() {
                continue;
            }
            self.upsert_property(conn, &path, prop).await?;
        }

        self.load_node(conn, &path)
            .await?
            .ok_or_else(|| VoSpaceError::InternalError("node vanished after insert".into()))
    }

    // -----------------------------------------------------------------
    // directory (read)
    // -----------------------------------------------------------------

    pub async fn directory(
        &self,
        path: &NodePath,
        identity: &Identity,
        detail: Detail,
        limit: Option<usize>,
    ) -> Result<Node, VoSpaceError> {
        let conn = self.connect_with_timeout().await?;

        let mut chain = path.strict_ancestors();
        chain.push(path.clone());
        for ancestor in &chain {
            if let Some(row) = self.load_row(&conn, &ancestor.as_str()).await? {
                self.check_read_permission(&row, identity, ancestor)?;
            }
        }

        let mut node = self
            .load_node(&conn, path)
            .await?
            .ok_or_else(|| VoSpaceError::NodeDoesNotExist(path.to_string()))?;

        match detail {
            Detail::Min => {
                node.header_mut().properties.clear();
                if let Node::ContainerNode(_, _, children) = &mut node {
                    children.clear();
                }
            }
            Detail::Properties => {
                if let Node::ContainerNode(_, _, children) = &mut node {
                    children.clear();
                }
            }
            Detail::Max => {}
        }

        if let (Node::ContainerNode(_, _, children), Some(limit)) = (&mut node, limit) {
            children.truncate(limit);
        }

        Ok(node)
    }

    fn check_read_permission(
        &self,
        row: &NodeRow,
        identity: &Identity,
        path: &NodePath,
    ) -> Result<(), VoSpaceError> {
        if let Some(owner) = &row.owner {
            if owner != identity.as_str() {
                return Err(VoSpaceError::PermissionDenied(format!(
                    "identity {identity} may not read {path}"
                )));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // update (merge properties)
    // -----------------------------------------------------------------

    pub async fn update(
        &self,
        path: &NodePath,
        properties: Vec<Property>,
        identity: &Identity,
    ) -> Result<Node, VoSpaceError> {
        self.with_retry(|| async {
            let conn = self.connect_with_timeout().await?;
            begin(&conn).await?;

            match self.update_inner(&conn, path, properties.clone(), identity).await {
                Ok(node) => {
                    commit(&conn).await?;
                    Ok(node)
                }
                Err(e) => {
                    rollback(&conn).await;
                    Err(e)
                }
            }
        })
        .await
    }

    async fn update_inner(
        &self,
        conn: &libsql::Connection,
        path: &NodePath,
        properties: Vec<Property>,
        identity: &Identity,
    ) -> Result<Node, VoSpaceError> {
        let row = self
            .load_row(conn, &path.as_str())
            .await?
            .ok_or_else(|| VoSpaceError::NodeDoesNotExist(path.to_string()))?;
        self.check_owner(&row, identity, path)?;

        for prop in &properties {
            let existing = self.load_property(conn, path, &prop.uri).await?;
            if let Some(existing) = &existing {
                if existing.read_only {
                    return Err(VoSpaceError::PermissionDenied(format!(
                        "property is read-only: {}",
                        prop.uri
                    )));
                }
            }
            if prop.is_delete() {
                if existing.is_some() {
                    self.delete_property(conn, path, &prop.uri).await?;
                }
            } else {
                self.upsert_property(conn, path, prop).await?;
            }
        }

        self.load_node(conn, path)
            .await?
            .ok_or_else(|| VoSpaceError::InternalError("node vanished during update".into()))
    }

    fn check_owner(&self, row: &NodeRow, identity: &Identity, path: &NodePath) -> Result<(), VoSpaceError> {
        if let Some(owner) = &row.owner {
            if owner != identity.as_str() {
                return Err(VoSpaceError::PermissionDenied(format!(
                    "identity {identity} does not own {path}"
                )));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // move
    // -----------------------------------------------------------------

    pub async fn move_node(
        &self,
        src: &NodePath,
        dest: &NodePath,
        identity: &Identity,
    ) -> Result<(), VoSpaceError> {
        self.with_retry(|| async {
            let conn = self.connect_with_timeout().await?;
            begin(&conn).await?;

            match self.move_inner(&conn, src, dest, identity).await {
                Ok(()) => {
                    commit(&conn).await?;
                    Ok(())
                }
                Err(e) => {
                    rollback(&conn).await;
                    Err(e)
                }
            }
        })
        .await
    }

    async fn move_inner(
        &self,
        conn: &libsql::Connection,
        src: &NodePath,
        dest: &NodePath,
        identity: &Identity,
    ) -> Result<(), VoSpaceError> {
        let src_row = self
            .load_row(conn, &src.as_str())
            .await?
            .ok_or_else(|| VoSpaceError::NodeDoesNotExist(src.to_string()))?;
        self.check_owner(&src_row, identity, src)?;

        let dest_parent = dest.parent().ok_or_else(|| {
            VoSpaceError::InvalidArgument("cannot move a node to the root path".into())
        })?;
        if src.is_self_or_ancestor_of(&dest_parent) {
            return Err(VoSpaceError::InvalidArgument(
                "destination is inside the source subtree".into(),
            ));
        }
        let dest_parent_row = self
            .load_row(conn, &dest_parent.as_str())
            .await?
            .ok_or_else(|| VoSpaceError::ContainerDoesNotExist(dest_parent.to_string()))?;
        if dest_parent_row.node_type != NodeType::ContainerNode {
            return Err(VoSpaceError::ContainerDoesNotExist(dest_parent.to_string()));
        }
        if self.load_row(conn, &dest.as_str()).await?.is_some() {
            return Err(VoSpaceError::DuplicateNode(dest.to_string()));
        }

        let subtree = self.subtree_paths(conn, src).await?;
        if src_row.busy {
            return Err(VoSpaceError::NodeIsBusy(src.to_string()));
        }
        for path in &subtree {
            if let Some(row) = self.load_row(conn, &path.as_str()).await? {
                if row.busy {
                    return Err(VoSpaceError::NodeIsBusy(path.to_string()));
                }
            }
        }

        for old_path in std::iter::once(src.clone()).chain(subtree.into_iter()) {
            let new_path = src.rewrite_prefix(&old_path, dest);
            conn.execute(
                "UPDATE nodes SET path = ? WHERE path = ?",
                (new_path.as_str(), old_path.as_str()),
            )
            .await
            .map_err(|e| VoSpaceError::from(DatabaseError::sql("rewrite node path", e)))?;
            conn.execute(
                "UPDATE properties SET node_path = ? WHERE node_path = ?",
                (new_path.as_str(), old_path.as_str()),
            )
            .await
            .map_err(|e| VoSpaceError::from(DatabaseError::sql("rewrite property path", e)))?;
        }

        Ok(())
    }

    // -----------------------------------------------------------------
    // copy
    // -----------------------------------------------------------------

    pub async fn copy_node(
        &self,
        src: &NodePath,
        dest: &NodePath,
        identity: &Identity,
    ) -> Result<Vec<Node>, VoSpaceError> {
        self.with_retry(|| async {
            let conn = self.connect_with_timeout().await?;
            begin(&conn).await?;

            match self.copy_inner(&conn, src, dest, identity).await {
                Ok(nodes) => {
                    commit(&conn).await?;
                    Ok(nodes)
                }
                Err(e) => {
                    rollback(&conn).await;
                    Err(e)
                }
            }
        })
        .await
    }

    async fn copy_inner(
        &self,
        conn: &libsql::Connection,
        src: &NodePath,
        dest: &NodePath,
        identity: &Identity,
    ) -> Result<Vec<Node>, VoSpaceError> {
        let src_node = self
            .load_node(conn, src)
            .await?
            .ok_or_else(|| VoSpaceError::NodeDoesNotExist(src.to_string()))?;

        let dest_parent = dest.parent().ok_or_else(|| {
            VoSpaceError::InvalidArgument("cannot copy a node to the root path".into())
        })?;
        let dest_parent_row = self
            .load_row(conn, &dest_parent.as_str())
            .await?
            .ok_or_else(|| VoSpaceError::ContainerDoesNotExist(dest_parent.to_string()))?;
        if dest_parent_row.node_type != NodeType::ContainerNode {
            return Err(VoSpaceError::ContainerDoesNotExist(dest_parent.to_string()));
        }
        if self.load_row(conn, &dest.as_str()).await?.is_some() {
            return Err(VoSpaceError::DuplicateNode(dest.to_string()));
        }

        let subtree = self.subtree_paths(conn, src).await?;
        let mut created = Vec::with_capacity(subtree.len() + 1);
        for old_path in std::iter::once(src.clone()).chain(subtree.into_iter()) {
            let node = self
                .load_node(conn, &old_path)
                .await?
                .ok_or_else(|| VoSpaceError::InternalError(format!("missing node: {old_path}")))?;
            let new_path = src.rewrite_prefix(&old_path, dest);
            let mut new_header = NodeHeader::new(new_path.clone());
            new_header.set_properties(node.properties().to_vec())?;
            new_header.capabilities = node.header().capabilities.clone();
            let new_node = match &node {
                Node::Node(_) => Node::Node(new_header),
                Node::DataNode(_, d) => Node::DataNode(new_header, d.clone()),
                Node::UnstructuredDataNode(_, d) => Node::UnstructuredDataNode(new_header, d.clone()),
                Node::StructuredDataNode(_, d) => Node::StructuredDataNode(new_header, d.clone()),
                Node::ContainerNode(_, d, _) => Node::ContainerNode(new_header, d.clone(), Vec::new()),
                Node::LinkNode(_, target) => Node::LinkNode(new_header, target.clone()),
            };
            self.create_inner(conn, new_node.clone(), identity).await?;
            created.push(new_node);
        }
        let _ = src_node;
        Ok(created)
    }

    // -----------------------------------------------------------------
    // delete
    // -----------------------------------------------------------------

    pub async fn delete(&self, path: &NodePath, identity: &Identity) -> Result<Vec<Node>, VoSpaceError> {
        self.with_retry(|| async {
            let conn = self.connect_with_timeout().await?;
            begin(&conn).await?;

            match self.delete_inner(&conn, path, identity).await {
                Ok(nodes) => {
                    commit(&conn).await?;
                    Ok(nodes)
                }
                Err(e) => {
                    rollback(&conn).await;
                    Err(e)
                }
            }
        })
        .await
    }

    /// Run a transactional body once more on a serialization conflict (spec
    /// §5: "conflicting commits must retry at most once and then surface
    /// `Conflict`"). SQLite/libsql surfaces a conflicting concurrent writer
    /// as a "database is locked"/"database table is locked" error from the
    /// failing `BEGIN`/`COMMIT`; anything else is returned as-is.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, VoSpaceError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, VoSpaceError>>,
    {
        match op().await {
            Err(e) if is_serialization_conflict(&e) => match op().await {
                Err(e) if is_serialization_conflict(&e) => Err(VoSpaceError::Conflict(e.to_string())),
                other => other,
            },
            other => other,
        }
    }

    async fn delete_inner(
        &self,
        conn: &libsql::Connection,
        path: &NodePath,
        identity: &Identity,
    ) -> Result<Vec<Node>, VoSpaceError> {
        let row = self
            .load_row(conn, &path.as_str())
            .await?
            .ok_or_else(|| VoSpaceError::NodeDoesNotExist(path.to_string()))?;
        self.check_owner(&row, identity, path)?;
        if row.busy {
            return Err(VoSpaceError::NodeIsBusy(path.to_string()));
        }

        let subtree = self.subtree_paths(conn, path).await?;
        let mut removed = Vec::with_capacity(subtree.len() + 1);
        for descendant in &subtree {
            if let Some(row) = self.load_row(conn, &descendant.as_str()).await? {
                if row.busy {
                    return Err(VoSpaceError::NodeIsBusy(descendant.to_string()));
                }
            }
        }

        for p in std::iter::once(path.clone()).chain(subtree.into_iter()) {
            if let Some(node) = self.load_node(conn, &p).await? {
                removed.push(node);
            }
            conn.execute("DELETE FROM properties WHERE node_path = ?", (p.as_str(),))
                .await
                .map_err(|e| VoSpaceError::from(DatabaseError::sql("delete node properties", e)))?;
            conn.execute("DELETE FROM nodes WHERE path = ?", (p.as_str(),))
                .await
                .map_err(|e| VoSpaceError::from(DatabaseError::sql("delete node", e)))?;
        }

        Ok(removed)
    }

    // -----------------------------------------------------------------
    // busy bit (used by the transfer engine as a lease)
    // -----------------------------------------------------------------

    pub async fn set_busy(&self, path: &NodePath, busy: bool) -> Result<(), VoSpaceError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(
            "UPDATE nodes SET busy = ? WHERE path = ?",
            (busy as i64, path.as_str()),
        )
        .await
        .map_err(|e| VoSpaceError::from(DatabaseError::sql("set busy", e)))?;
        Ok(())
    }

    pub async fn get_node(&self, path: &NodePath) -> Result<Option<Node>, VoSpaceError> {
        let conn = self.connect_with_timeout().await?;
        Ok(self.load_node(&conn, path).await?)
    }

    /// Clear `busy` on every node in a terminal phase's job, and mark jobs
    /// found `EXECUTING` at startup `ERROR` — called once by
    /// `TransferEngine::recover_at_startup` (spec §5 "Busy bit as lease").
    pub async fn clear_busy_bulk(&self, paths: &[NodePath]) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        for path in paths {
            conn.execute("UPDATE nodes SET busy = 0 WHERE path = ?", (path.as_str(),))
                .await
                .map_err(|e| DatabaseError::sql("clear busy", e))?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // row <-> Node assembly
    // -----------------------------------------------------------------

    async fn load_row(&self, conn: &libsql::Connection, path: &str) -> Result<Option<NodeRow>, DatabaseError> {
        let mut stmt = conn
            .prepare(
                "SELECT node_type, busy, owner, link_target, accepts_json, provides_json, capabilities_json
                 FROM nodes WHERE path = ?",
            )
            .await
            .map_err(|e| DatabaseError::sql("prepare load_row", e))?;
        let mut rows = stmt.query((path,)).await.map_err(|e| DatabaseError::sql("query load_row", e))?;
        let Some(row) = rows.next().await.map_err(|e| DatabaseError::sql("step load_row", e))? else {
            return Ok(None);
        };

        let node_type_token: String = row.get(0).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
        let busy: i64 = row.get(1).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
        let owner: Option<String> = row.get(2).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
        let link_target: Option<String> =
            row.get(3).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
        let accepts_json: String = row.get(4).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
        let provides_json: String = row.get(5).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
        let capabilities_json: String =
            row.get(6).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;

        let node_type = NodeType::parse(&node_type_token)
            .map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
        let accepts: Vec<View> =
            serde_json::from_str(&accepts_json).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
        let provides: Vec<View> =
            serde_json::from_str(&provides_json).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
        let capabilities: Vec<Capability> = serde_json::from_str(&capabilities_json)
            .map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;

        Ok(Some(NodeRow {
            node_type,
            busy: busy != 0,
            owner,
            link_target,
            accepts,
            provides,
            capabilities,
        }))
    }

    async fn load_properties(
        &self,
        conn: &libsql::Connection,
        path: &str,
    ) -> Result<Vec<Property>, DatabaseError> {
        let mut stmt = conn
            .prepare("SELECT uri, value, read_only FROM properties WHERE node_path = ?")
            .await
            .map_err(|e| DatabaseError::sql("prepare load_properties", e))?;
        let mut rows = stmt
            .query((path,))
            .await
            .map_err(|e| DatabaseError::sql("query load_properties", e))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| DatabaseError::sql("step load_properties", e))? {
            let uri: String = row.get(0).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
            let value: String = row.get(1).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
            let read_only: i64 = row.get(2).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
            out.push(Property::new(uri, value, read_only != 0));
        }
        Ok(out)
    }

    async fn load_property(
        &self,
        conn: &libsql::Connection,
        path: &NodePath,
        uri: &str,
    ) -> Result<Option<Property>, DatabaseError> {
        let mut stmt = conn
            .prepare("SELECT uri, value, read_only FROM properties WHERE node_path = ? AND uri = ?")
            .await
            .map_err(|e| DatabaseError::sql("prepare load_property", e))?;
        let mut rows = stmt
            .query((path.as_str(), uri))
            .await
            .map_err(|e| DatabaseError::sql("query load_property", e))?;
        let Some(row) = rows.next().await.map_err(|e| DatabaseError::sql("step load_property", e))? else {
            return Ok(None);
        };
        let uri: String = row.get(0).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
        let value: String = row.get(1).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
        let read_only: i64 = row.get(2).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
        Ok(Some(Property::new(uri, value, read_only != 0)))
    }

    async fn upsert_property(
        &self,
        conn: &libsql::Connection,
        path: &NodePath,
        prop: &Property,
    ) -> Result<(), VoSpaceError> {
        conn.execute(
            "INSERT INTO properties (node_path, uri, value, read_only) VALUES (?, ?, ?, ?)
             ON CONFLICT(node_path, uri) DO UPDATE SET value = excluded.value, read_only = excluded.read_only",
            (
                path.as_str(),
                prop.uri.as_str(),
                prop.value.clone().unwrap_or_default(),
                prop.read_only as i64,
            ),
        )
        .await
        .map_err(|e| VoSpaceError::from(DatabaseError::sql("upsert property", e)))?;
        Ok(())
    }

    async fn delete_property(
        &self,
        conn: &libsql::Connection,
        path: &NodePath,
        uri: &str,
    ) -> Result<(), VoSpaceError> {
        conn.execute(
            "DELETE FROM properties WHERE node_path = ? AND uri = ?",
            (path.as_str(), uri),
        )
        .await
        .map_err(|e| VoSpaceError::from(DatabaseError::sql("delete property", e)))?;
        Ok(())
    }

    /// All paths stored anywhere under `container` (not limited to direct
    /// children), sorted ascending.
    async fn subtree_paths(
        &self,
        conn: &libsql::Connection,
        container: &NodePath,
    ) -> Result<Vec<NodePath>, DatabaseError> {
        let all = self.all_paths(conn).await?;
        let mut out: Vec<NodePath> = all.into_iter().filter(|p| container.is_strict_ancestor_of(p)).collect();
        out.sort();
        Ok(out)
    }

    /// Direct children of `container`, sorted ascending by path.
    async fn direct_children(
        &self,
        conn: &libsql::Connection,
        container: &NodePath,
    ) -> Result<Vec<ChildRef>, DatabaseError> {
        let depth = container.segments().len();
        let mut children = Vec::new();
        for path in self.all_paths(conn).await? {
            if path.segments().len() != depth + 1 || !container.is_strict_ancestor_of(&path) {
                continue;
            }
            if let Some(row) = self.load_row(conn, &path.as_str()).await? {
                children.push(ChildRef { path, node_type: row.node_type, busy: row.busy });
            }
        }
        children.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(children)
    }

    async fn all_paths(&self, conn: &libsql::Connection) -> Result<Vec<NodePath>, DatabaseError> {
        let mut stmt = conn
            .prepare("SELECT path FROM nodes WHERE path != ''")
            .await
            .map_err(|e| DatabaseError::sql("prepare all_paths", e))?;
        let mut rows = stmt.query(()).await.map_err(|e| DatabaseError::sql("query all_paths", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| DatabaseError::sql("step all_paths", e))? {
            let raw: String = row.get(0).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
            out.push(NodePath::parse(&raw).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?);
        }
        Ok(out)
    }

    async fn load_node(&self, conn: &libsql::Connection, path: &NodePath) -> Result<Option<Node>, VoSpaceError> {
        let Some(row) = self.load_row(conn, &path.as_str()).await? else {
            return Ok(None);
        };
        let properties = self.load_properties(conn, &path.as_str()).await?;

        let mut header = NodeHeader::new(path.clone());
        header.set_properties(properties)?;
        header.capabilities = row.capabilities;

        let data_fields = DataNodeFields { accepts: row.accepts, provides: row.provides, busy: row.busy };

        let node = match row.node_type {
            NodeType::Node => Node::Node(header),
            NodeType::LinkNode => {
                let target = row
                    .link_target
                    .ok_or_else(|| VoSpaceError::InternalError(format!("link node missing target: {path}")))?;
                Node::LinkNode(header, target)
            }
            NodeType::DataNode => Node::DataNode(header, data_fields),
            NodeType::UnstructuredDataNode => Node::UnstructuredDataNode(header, data_fields),
            NodeType::StructuredDataNode => Node::StructuredDataNode(header, data_fields),
            NodeType::ContainerNode => {
                let children = self.direct_children(conn, path).await?;
                Node::ContainerNode(header, data_fields, children)
            }
        };
        Ok(node)
    }
}

fn json_encode<T: serde::Serialize>(value: &T) -> Result<String, VoSpaceError> {
    serde_json::to_string(value).map_err(|e| VoSpaceError::InternalError(e.to_string()))
}

async fn begin(conn: &libsql::Connection) -> Result<(), VoSpaceError> {
    conn.execute("BEGIN TRANSACTION", ())
        .await
        .map_err(|e| VoSpaceError::from(DatabaseError::sql("begin transaction", e)))?;
    Ok(())
}

async fn commit(conn: &libsql::Connection) -> Result<(), VoSpaceError> {
    conn.execute("COMMIT", ()).await.map_err(|e| {
        let _ = conn.execute("ROLLBACK", ());
        VoSpaceError::from(DatabaseError::sql("commit transaction", e))
    })?;
    Ok(())
}

async fn rollback(conn: &libsql::Connection) {
    let _ = conn.execute("ROLLBACK", ()).await;
}

/// Whether an error surfaced from a transactional operation looks like a
/// database-level write conflict rather than a business-logic rejection.
fn is_serialization_conflict(e: &VoSpaceError) -> bool {
    let VoSpaceError::InternalError(message) = e else { return false };
    let lower = message.to_lowercase();
    lower.contains("database is locked") || lower.contains("database table is locked") || lower.contains("busy")
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
