//! SQLite-backed `AttestationStore`.

use ats_core::bounded::Enforcer;
use ats_core::observer::{AttestationObserver, MerkleBacked, MerkleObserver};
use ats_core::storage::{AttestationQuery, AttestationStore, StoreError, StoreResult};
use ats_core::Attestation;
use rusqlite::{Connection, OptionalExtension};

use crate::json::{
    deserialize_attributes, deserialize_string_vec, serialize_attributes, serialize_string_vec,
};

/// SQLite-backed attestation store. Wires the Merkle observer and the
/// bounded-storage enforcer into `create`, the same way `ats_core::
/// MemoryStore` does.
pub struct SqliteStore {
    conn: Connection,
    tree: MerkleObserver,
    enforcer: Enforcer,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> crate::error::Result<Self> {
        crate::migrate::migrate(&conn)?;
        let store = Self {
            conn,
            tree: MerkleObserver::new(),
            enforcer: Enforcer::new(Default::default()),
        };
        store.rehydrate_tree()?;
        Ok(store)
    }

    pub fn with_enforcer(conn: Connection, enforcer: Enforcer) -> crate::error::Result<Self> {
        crate::migrate::migrate(&conn)?;
        let store = Self {
            conn,
            tree: MerkleObserver::new(),
            enforcer,
        };
        store.rehydrate_tree()?;
        Ok(store)
    }

    pub fn in_memory() -> crate::error::Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Self::new(conn)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn tree(&self) -> &MerkleObserver {
        &self.tree
    }

    /// Rebuild the Merkle tree from everything currently in the database.
    /// The tree is never persisted itself, so every constructor calls this
    /// before returning — reopening a populated database must not hand back
    /// a store whose tree disagrees with its rows. Exposed publicly so a
    /// caller can force a rebuild after writing to the database out of band.
    pub fn rehydrate_tree(&self) -> StoreResult<()> {
        for id in self.ids()? {
            if let Some(a) = self.get(&id)? {
                self.tree.on_insert(&a);
            }
        }
        Ok(())
    }
}

impl MerkleBacked for SqliteStore {
    fn tree(&self) -> &MerkleObserver {
        &self.tree
    }
}

impl AttestationStore for SqliteStore {
    fn create(&mut self, attestation: Attestation) -> StoreResult<()> {
        if self.exists(&attestation.id)? {
            return Err(StoreError::AlreadyExists(attestation.id));
        }

        insert_row(&self.conn, &attestation)?;
        self.tree.on_insert(&attestation);

        self.enforcer
            .enforce(&mut RawSqlHandle(&self.conn), &self.tree, &attestation)?;

        Ok(())
    }

    fn get(&self, id: &str) -> StoreResult<Option<Attestation>> {
        get_row(&self.conn, id)
    }

    fn delete(&mut self, id: &str) -> StoreResult<bool> {
        delete_row(&self.conn, id)
    }

    fn query(&self, query: &AttestationQuery) -> StoreResult<Vec<Attestation>> {
        query_rows(&self.conn, query)
    }

    fn ids(&self) -> StoreResult<Vec<String>> {
        ids_rows(&self.conn)
    }
}

/// Adapts a shared `&Connection` to `AttestationStore` so the enforcer can
/// scan and delete rows without needing a second mutable borrow of
/// `SqliteStore` (whose `tree`/`enforcer` fields are borrowed at the same
/// call site). `rusqlite::Connection`'s methods take `&self`, so this
/// needs no interior mutability of its own.
struct RawSqlHandle<'a>(&'a Connection);

impl AttestationStore for RawSqlHandle<'_> {
    fn create(&mut self, attestation: Attestation) -> StoreResult<()> {
        insert_row(self.0, &attestation)
    }

    fn get(&self, id: &str) -> StoreResult<Option<Attestation>> {
        get_row(self.0, id)
    }

    fn delete(&mut self, id: &str) -> StoreResult<bool> {
        delete_row(self.0, id)
    }

    fn query(&self, query: &AttestationQuery) -> StoreResult<Vec<Attestation>> {
        query_rows(self.0, query)
    }

    fn ids(&self) -> StoreResult<Vec<String>> {
        ids_rows(self.0)
    }
}

fn insert_row(conn: &Connection, attestation: &Attestation) -> StoreResult<()> {
    let subjects_json = serialize_string_vec(&attestation.subjects).map_err(StoreError::from)?;
    let predicates_json =
        serialize_string_vec(&attestation.predicates).map_err(StoreError::from)?;
    let contexts_json = serialize_string_vec(&attestation.contexts).map_err(StoreError::from)?;
    let actors_json = serialize_string_vec(&attestation.actors).map_err(StoreError::from)?;
    let attributes_json = serialize_attributes(&attestation.attributes).map_err(StoreError::from)?;

    conn.execute(
        "INSERT INTO attestations (id, subjects, predicates, contexts, actors, timestamp, source, attributes, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            attestation.id,
            subjects_json,
            predicates_json,
            contexts_json,
            actors_json,
            attestation.timestamp,
            attestation.source,
            attributes_json,
            attestation.created_at,
        ],
    )
    .map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(())
}

#[allow(clippy::type_complexity)]
fn get_row(conn: &Connection, id: &str) -> StoreResult<Option<Attestation>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, subjects, predicates, contexts, actors, timestamp, source, attributes, created_at
             FROM attestations WHERE id = ?",
        )
        .map_err(|e| StoreError::Backend(e.to_string()))?;

    let row: Option<(String, String, String, String, String, i64, String, Option<String>, i64)> = stmt
        .query_row([id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
            ))
        })
        .optional()
        .map_err(|e| StoreError::Backend(e.to_string()))?;

    let Some((id, subjects, predicates, contexts, actors, timestamp, source, attributes, created_at)) = row
    else {
        return Ok(None);
    };

    Ok(Some(Attestation {
        id,
        subjects: deserialize_string_vec(&subjects).map_err(StoreError::from)?,
        predicates: deserialize_string_vec(&predicates).map_err(StoreError::from)?,
        contexts: deserialize_string_vec(&contexts).map_err(StoreError::from)?,
        actors: deserialize_string_vec(&actors).map_err(StoreError::from)?,
        timestamp,
        source,
        attributes: deserialize_attributes(attributes).map_err(StoreError::from)?,
        created_at,
    }))
}

fn delete_row(conn: &Connection, id: &str) -> StoreResult<bool> {
    let rows = conn
        .execute("DELETE FROM attestations WHERE id = ?", [id])
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    Ok(rows > 0)
}

fn ids_rows(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT id FROM attestations ORDER BY created_at ASC")
        .map_err(|e| StoreError::Backend(e.to_string()))?;

    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| StoreError::Backend(e.to_string()))?
        .collect::<Result<Vec<String>, rusqlite::Error>>()
        .map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(ids)
}

fn query_rows(conn: &Connection, query: &AttestationQuery) -> StoreResult<Vec<Attestation>> {
    // No dynamic SQL filter pushdown yet — scan and filter in process. The
    // (actor, context) cardinality limits keep any one actor/context's
    // attestation count small, so this stays cheap.
    let mut out = Vec::new();
    for id in ids_rows(conn)? {
        if let Some(a) = get_row(conn, &id)? {
            let actor_ok = query.actors.is_empty() || a.actors.iter().any(|x| query.actors.contains(x));
            let context_ok =
                query.contexts.is_empty() || a.contexts.iter().any(|x| query.contexts.contains(x));
            if actor_ok && context_ok {
                out.push(a);
            }
        }
    }
    Ok(out)
}
