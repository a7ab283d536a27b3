//! SQLite implementation of [`RecordStore`].
//!
//! [`SqliteStore`] persists the concept graph in a SQLite database with
//! foreign keys enforcing the cascades the schema declares, and automatic
//! schema migrations. Node values (arbitrary JSON) are stored as TEXT via
//! serde_json.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};

use cgraph_core::schema::{LinkTable, CONTEXT_TABLE, PREDICATE_TABLE};
use cgraph_core::{
    Concept, ConceptId, ContextTarget, EntityKind, Framework, FrameworkId, Law, LawId, Node,
    NodeId, Predicate,
};

use crate::error::StorageError;
use crate::traits::RecordStore;

const FRAMEWORK_COLUMNS: &str = "id, name, description";

const CONCEPT_COLUMNS: &str = "id, name, description, framework, head, reference, symmetric, \
     node_specific, law_specific, inherits, symbol, commands, value";

const LAW_COLUMNS: &str = "id, name, description, framework, hashtags, revision";

const NODE_COLUMNS: &str = "id, law, concept, head, reference, name, value_json";

/// SQLite-backed implementation of [`RecordStore`].
///
/// Write transactions are opened with `BEGIN IMMEDIATE`, so a save holds the
/// database write lock from its first statement to its commit.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Runs a query and collects every mapped row.
    fn query_list<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, map)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Runs a query expected to return at most one row.
    fn query_one<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>, StorageError> {
        let row = self.conn.query_row(sql, params, map).optional()?;
        Ok(row)
    }

    /// Maps "no row touched" to a not-found error.
    fn expect_touched(rows: usize, kind: EntityKind, id: i64) -> Result<(), StorageError> {
        if rows == 0 {
            return Err(StorageError::NotFound { kind, id });
        }
        Ok(())
    }

    fn framework_from_row(row: &Row<'_>) -> rusqlite::Result<Framework> {
        Ok(Framework {
            id: FrameworkId(row.get(0)?),
            name: row.get(1)?,
            description: row.get(2)?,
        })
    }

    fn concept_from_row(row: &Row<'_>) -> rusqlite::Result<Concept> {
        Ok(Concept {
            id: ConceptId(row.get(0)?),
            name: row.get(1)?,
            description: row.get(2)?,
            framework: row.get::<_, Option<i64>>(3)?.map(FrameworkId),
            head: row.get::<_, Option<i64>>(4)?.map(ConceptId),
            reference: row.get::<_, Option<i64>>(5)?.map(ConceptId),
            symmetric: row.get(6)?,
            node_specific: row.get(7)?,
            law_specific: row.get(8)?,
            inherits: row.get(9)?,
            symbol: row.get(10)?,
            commands: row.get(11)?,
            value: row.get(12)?,
        })
    }

    fn law_from_row(row: &Row<'_>) -> rusqlite::Result<Law> {
        Ok(Law {
            id: LawId(row.get(0)?),
            name: row.get(1)?,
            description: row.get(2)?,
            framework: row.get::<_, Option<i64>>(3)?.map(FrameworkId),
            hashtags: row.get(4)?,
            revision: row.get(5)?,
        })
    }

    fn node_from_row(row: &Row<'_>) -> rusqlite::Result<Node> {
        let value_json: Option<String> = row.get(6)?;
        let value = match value_json {
            Some(text) => Some(serde_json::from_str(&text).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e))
            })?),
            None => None,
        };
        Ok(Node {
            id: NodeId(row.get(0)?),
            law: LawId(row.get(1)?),
            concept: ConceptId(row.get(2)?),
            head: row.get::<_, Option<i64>>(3)?.map(NodeId),
            reference: row.get::<_, Option<i64>>(4)?.map(NodeId),
            name: row.get(5)?,
            value,
        })
    }

    fn predicate_from_row(row: &Row<'_>) -> rusqlite::Result<Predicate> {
        Ok(Predicate {
            node: NodeId(row.get(0)?),
            predicate_group: row.get(1)?,
        })
    }

    fn node_value_json(node: &Node) -> Result<Option<String>, StorageError> {
        match &node.value {
            Some(value) => Ok(Some(serde_json::to_string(value)?)),
            None => Ok(None),
        }
    }
}

impl RecordStore for SqliteStore {
    // -------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------

    fn begin(&mut self) -> Result<(), StorageError> {
        if self.in_transaction() {
            return Err(StorageError::TransactionState {
                reason: "a transaction is already open".to_string(),
            });
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if !self.in_transaction() {
            return Err(StorageError::TransactionState {
                reason: "commit without an open transaction".to_string(),
            });
        }
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        if !self.in_transaction() {
            return Err(StorageError::TransactionState {
                reason: "rollback without an open transaction".to_string(),
            });
        }
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    // -------------------------------------------------------------------
    // Kind-generic operations
    // -------------------------------------------------------------------

    fn exists(&self, kind: EntityKind, id: i64) -> Result<bool, StorageError> {
        let exists: bool = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", kind.table()),
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn delete(&mut self, kind: EntityKind, id: i64) -> Result<(), StorageError> {
        if kind == EntityKind::Concept {
            // node.concept has no cascade: a concept in use cannot go.
            let users = self.find_nodes_by_concept(ConceptId(id))?;
            if !users.is_empty() {
                return Err(StorageError::IntegrityError {
                    reason: format!("concept {} is used by {} node(s)", id, users.len()),
                });
            }
        }
        let rows = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
            params![id],
        )?;
        Self::expect_touched(rows, kind, id)
    }

    fn next_id(&self, kind: EntityKind) -> Result<i64, StorageError> {
        let seq: Option<i64> = self.query_one(
            "SELECT seq FROM sqlite_sequence WHERE name = ?1",
            params![kind.table()],
            |row| row.get(0),
        )?;
        Ok(seq.unwrap_or(0) + 1)
    }

    fn reset_sequence(&mut self, kind: EntityKind) -> Result<(), StorageError> {
        if self.in_transaction() {
            return Err(StorageError::SequenceResetInTransaction { kind });
        }
        self.conn.execute(
            &format!(
                "UPDATE sqlite_sequence SET seq = (SELECT COALESCE(MAX(id), 0) FROM {}) WHERE name = ?1",
                kind.table()
            ),
            params![kind.table()],
        )?;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Frameworks
    // -------------------------------------------------------------------

    fn insert_framework(&mut self, framework: &Framework) -> Result<FrameworkId, StorageError> {
        self.conn.execute(
            "INSERT INTO framework (name, description) VALUES (?1, ?2)",
            params![framework.name, framework.description],
        )?;
        Ok(FrameworkId(self.conn.last_insert_rowid()))
    }

    fn get_framework(&self, id: FrameworkId) -> Result<Framework, StorageError> {
        self.query_one(
            &format!("SELECT {FRAMEWORK_COLUMNS} FROM framework WHERE id = ?1"),
            params![id.0],
            Self::framework_from_row,
        )?
        .ok_or(StorageError::NotFound {
            kind: EntityKind::Framework,
            id: id.0,
        })
    }

    fn update_framework(&mut self, framework: &Framework) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE framework SET name = ?2, description = ?3 WHERE id = ?1",
            params![framework.id.0, framework.name, framework.description],
        )?;
        Self::expect_touched(rows, EntityKind::Framework, framework.id.0)
    }

    fn list_frameworks(&self) -> Result<Vec<Framework>, StorageError> {
        self.query_list(
            &format!("SELECT {FRAMEWORK_COLUMNS} FROM framework ORDER BY id"),
            [],
            Self::framework_from_row,
        )
    }

    fn find_frameworks_by_name(&self, name: &str) -> Result<Vec<Framework>, StorageError> {
        self.query_list(
            &format!("SELECT {FRAMEWORK_COLUMNS} FROM framework WHERE name = ?1 ORDER BY id"),
            params![name],
            Self::framework_from_row,
        )
    }

    // -------------------------------------------------------------------
    // Concepts
    // -------------------------------------------------------------------

    fn insert_concept(&mut self, concept: &Concept) -> Result<ConceptId, StorageError> {
        self.conn.execute(
            "INSERT INTO concept (name, description, framework, head, reference, symmetric, \
             node_specific, law_specific, inherits, symbol, commands, value) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                concept.name,
                concept.description,
                concept.framework.map(|f| f.0),
                concept.head.map(|c| c.0),
                concept.reference.map(|c| c.0),
                concept.symmetric,
                concept.node_specific,
                concept.law_specific,
                concept.inherits,
                concept.symbol,
                concept.commands,
                concept.value,
            ],
        )?;
        Ok(ConceptId(self.conn.last_insert_rowid()))
    }

    fn get_concept(&self, id: ConceptId) -> Result<Concept, StorageError> {
        self.query_one(
            &format!("SELECT {CONCEPT_COLUMNS} FROM concept WHERE id = ?1"),
            params![id.0],
            Self::concept_from_row,
        )?
        .ok_or(StorageError::NotFound {
            kind: EntityKind::Concept,
            id: id.0,
        })
    }

    fn update_concept(&mut self, concept: &Concept) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE concept SET name = ?2, description = ?3, framework = ?4, head = ?5, \
             reference = ?6, symmetric = ?7, node_specific = ?8, law_specific = ?9, \
             inherits = ?10, symbol = ?11, commands = ?12, value = ?13 WHERE id = ?1",
            params![
                concept.id.0,
                concept.name,
                concept.description,
                concept.framework.map(|f| f.0),
                concept.head.map(|c| c.0),
                concept.reference.map(|c| c.0),
                concept.symmetric,
                concept.node_specific,
                concept.law_specific,
                concept.inherits,
                concept.symbol,
                concept.commands,
                concept.value,
            ],
        )?;
        Self::expect_touched(rows, EntityKind::Concept, concept.id.0)
    }

    fn set_concept_links(
        &mut self,
        id: ConceptId,
        head: Option<ConceptId>,
        reference: Option<ConceptId>,
    ) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE concept SET head = ?2, reference = ?3 WHERE id = ?1",
            params![id.0, head.map(|c| c.0), reference.map(|c| c.0)],
        )?;
        Self::expect_touched(rows, EntityKind::Concept, id.0)
    }

    fn find_concepts_by_framework(
        &self,
        framework: Option<FrameworkId>,
    ) -> Result<Vec<Concept>, StorageError> {
        match framework {
            Some(framework) => self.query_list(
                &format!("SELECT {CONCEPT_COLUMNS} FROM concept WHERE framework = ?1 ORDER BY id"),
                params![framework.0],
                Self::concept_from_row,
            ),
            None => self.query_list(
                &format!("SELECT {CONCEPT_COLUMNS} FROM concept WHERE framework IS NULL ORDER BY id"),
                [],
                Self::concept_from_row,
            ),
        }
    }

    fn find_concepts_pointing_at(&self, target: ConceptId) -> Result<Vec<Concept>, StorageError> {
        self.query_list(
            &format!(
                "SELECT {CONCEPT_COLUMNS} FROM concept WHERE head = ?1 OR reference = ?1 ORDER BY id"
            ),
            params![target.0],
            Self::concept_from_row,
        )
    }

    // -------------------------------------------------------------------
    // Laws
    // -------------------------------------------------------------------

    fn insert_law(&mut self, law: &Law) -> Result<LawId, StorageError> {
        self.conn.execute(
            "INSERT INTO law (name, description, framework, hashtags, revision) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                law.name,
                law.description,
                law.framework.map(|f| f.0),
                law.hashtags,
                law.revision,
            ],
        )?;
        Ok(LawId(self.conn.last_insert_rowid()))
    }

    fn get_law(&self, id: LawId) -> Result<Law, StorageError> {
        self.query_one(
            &format!("SELECT {LAW_COLUMNS} FROM law WHERE id = ?1"),
            params![id.0],
            Self::law_from_row,
        )?
        .ok_or(StorageError::NotFound {
            kind: EntityKind::Law,
            id: id.0,
        })
    }

    fn update_law(&mut self, law: &Law) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE law SET name = ?2, description = ?3, framework = ?4, hashtags = ?5, \
             revision = ?6 WHERE id = ?1",
            params![
                law.id.0,
                law.name,
                law.description,
                law.framework.map(|f| f.0),
                law.hashtags,
                law.revision,
            ],
        )?;
        Self::expect_touched(rows, EntityKind::Law, law.id.0)
    }

    fn find_laws_by_framework(&self, framework: FrameworkId) -> Result<Vec<Law>, StorageError> {
        self.query_list(
            &format!("SELECT {LAW_COLUMNS} FROM law WHERE framework = ?1 ORDER BY id"),
            params![framework.0],
            Self::law_from_row,
        )
    }

    // -------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------

    fn insert_node(&mut self, node: &Node) -> Result<NodeId, StorageError> {
        let value_json = Self::node_value_json(node)?;
        self.conn.execute(
            "INSERT INTO node (law, concept, head, reference, name, value_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                node.law.0,
                node.concept.0,
                node.head.map(|n| n.0),
                node.reference.map(|n| n.0),
                node.name,
                value_json,
            ],
        )?;
        Ok(NodeId(self.conn.last_insert_rowid()))
    }

    fn get_node(&self, id: NodeId) -> Result<Node, StorageError> {
        self.query_one(
            &format!("SELECT {NODE_COLUMNS} FROM node WHERE id = ?1"),
            params![id.0],
            Self::node_from_row,
        )?
        .ok_or(StorageError::NotFound {
            kind: EntityKind::Node,
            id: id.0,
        })
    }

    fn update_node(&mut self, node: &Node) -> Result<(), StorageError> {
        let value_json = Self::node_value_json(node)?;
        let rows = self.conn.execute(
            "UPDATE node SET law = ?2, concept = ?3, head = ?4, reference = ?5, name = ?6, \
             value_json = ?7 WHERE id = ?1",
            params![
                node.id.0,
                node.law.0,
                node.concept.0,
                node.head.map(|n| n.0),
                node.reference.map(|n| n.0),
                node.name,
                value_json,
            ],
        )?;
        Self::expect_touched(rows, EntityKind::Node, node.id.0)
    }

    fn set_node_links(
        &mut self,
        id: NodeId,
        head: Option<NodeId>,
        reference: Option<NodeId>,
    ) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE node SET head = ?2, reference = ?3 WHERE id = ?1",
            params![id.0, head.map(|n| n.0), reference.map(|n| n.0)],
        )?;
        Self::expect_touched(rows, EntityKind::Node, id.0)
    }

    fn find_nodes_by_law(&self, law: LawId) -> Result<Vec<Node>, StorageError> {
        self.query_list(
            &format!("SELECT {NODE_COLUMNS} FROM node WHERE law = ?1 ORDER BY id"),
            params![law.0],
            Self::node_from_row,
        )
    }

    fn find_nodes_by_concept(&self, concept: ConceptId) -> Result<Vec<Node>, StorageError> {
        self.query_list(
            &format!("SELECT {NODE_COLUMNS} FROM node WHERE concept = ?1 ORDER BY id"),
            params![concept.0],
            Self::node_from_row,
        )
    }

    // -------------------------------------------------------------------
    // Predicates
    // -------------------------------------------------------------------

    fn insert_predicate(&mut self, predicate: &Predicate) -> Result<(), StorageError> {
        self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {PREDICATE_TABLE} (node, predicate_group) VALUES (?1, ?2)"
            ),
            params![predicate.node.0, predicate.predicate_group],
        )?;
        Ok(())
    }

    fn find_predicates_by_node(&self, node: NodeId) -> Result<Vec<Predicate>, StorageError> {
        self.query_list(
            &format!(
                "SELECT node, predicate_group FROM {PREDICATE_TABLE} WHERE node = ?1 \
                 ORDER BY predicate_group"
            ),
            params![node.0],
            Self::predicate_from_row,
        )
    }

    fn delete_predicates_by_node(&mut self, node: NodeId) -> Result<usize, StorageError> {
        let rows = self.conn.execute(
            &format!("DELETE FROM {PREDICATE_TABLE} WHERE node = ?1"),
            params![node.0],
        )?;
        Ok(rows)
    }

    // -------------------------------------------------------------------
    // Link tables
    // -------------------------------------------------------------------

    fn insert_link(
        &mut self,
        table: &LinkTable,
        owner: i64,
        target: i64,
    ) -> Result<(), StorageError> {
        self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?1, ?2)",
                table.name, table.owner_column, table.target_column
            ),
            params![owner, target],
        )?;
        Ok(())
    }

    fn find_links(&self, table: &LinkTable, owner: i64) -> Result<Vec<i64>, StorageError> {
        self.query_list(
            &format!(
                "SELECT {target} FROM {name} WHERE {owner} = ?1 ORDER BY {target}",
                target = table.target_column,
                name = table.name,
                owner = table.owner_column
            ),
            params![owner],
            |row| row.get(0),
        )
    }

    fn find_linkers(&self, table: &LinkTable, target: i64) -> Result<Vec<i64>, StorageError> {
        self.query_list(
            &format!(
                "SELECT {owner} FROM {name} WHERE {target} = ?1 ORDER BY {owner}",
                target = table.target_column,
                name = table.name,
                owner = table.owner_column
            ),
            params![target],
            |row| row.get(0),
        )
    }

    fn delete_links(&mut self, table: &LinkTable, owner: i64) -> Result<usize, StorageError> {
        let rows = self.conn.execute(
            &format!("DELETE FROM {} WHERE {} = ?1", table.name, table.owner_column),
            params![owner],
        )?;
        Ok(rows)
    }

    // -------------------------------------------------------------------
    // Concept contexts
    // -------------------------------------------------------------------

    fn get_context(&self, concept: ConceptId) -> Result<Option<ContextTarget>, StorageError> {
        let row: Option<(Option<i64>, Option<i64>)> = self.query_one(
            &format!("SELECT node, law FROM {CONTEXT_TABLE} WHERE concept = ?1"),
            params![concept.0],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        match row {
            None => Ok(None),
            Some((Some(node), _)) => Ok(Some(ContextTarget::Node(NodeId(node)))),
            Some((None, Some(law))) => Ok(Some(ContextTarget::Law(LawId(law)))),
            Some((None, None)) => Err(StorageError::IntegrityError {
                reason: format!("context of concept {} has no target", concept.0),
            }),
        }
    }

    fn set_context(
        &mut self,
        concept: ConceptId,
        target: ContextTarget,
    ) -> Result<(), StorageError> {
        let (node, law) = match target {
            ContextTarget::Node(node) => (Some(node.0), None),
            ContextTarget::Law(law) => (None, Some(law.0)),
        };
        self.conn.execute(
            &format!(
                "INSERT INTO {CONTEXT_TABLE} (concept, node, law) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(concept) DO UPDATE SET node = excluded.node, law = excluded.law"
            ),
            params![concept.0, node, law],
        )?;
        Ok(())
    }

    fn clear_context(&mut self, concept: ConceptId) -> Result<bool, StorageError> {
        let removed = self.conn.execute(
            &format!("DELETE FROM {CONTEXT_TABLE} WHERE concept = ?1"),
            params![concept.0],
        )?;
        Ok(removed > 0)
    }

    fn find_concepts_bound_to(
        &self,
        target: ContextTarget,
    ) -> Result<Vec<ConceptId>, StorageError> {
        let (column, id) = match target {
            ContextTarget::Node(node) => ("node", node.0),
            ContextTarget::Law(law) => ("law", law.0),
        };
        self.query_list(
            &format!("SELECT concept FROM {CONTEXT_TABLE} WHERE {column} = ?1 ORDER BY concept"),
            params![id],
            |row| Ok(ConceptId(row.get(0)?)),
        )
    }
}
