//! # Server Module
//!
//! Connection lifecycle over one [`DataSource`].
//!
//! ```text
//! Disconnected --connect--> Connected --disconnect--> Disconnected
//! Connected --freeze--> image{was_connected} --thaw--> Connected
//! ```
//!
//! A `Server` is a cheap, shared handle: clones observe the same connection.
//! Databases and collections resolve the connection through their server at
//! operation time, so a disconnect is seen by every handle derived from it.

use crate::database::Database;
use crate::formats::{ServerImage, image_from_bytes, image_to_bytes};
use crate::storage::{Connection, Driver, DriverStats};
use crate::{DataSource, OntobaseError};
use enumset::{EnumSet, EnumSetType};
use std::cell::RefCell;
use std::rc::Rc;

/// Flags controlling [`Server::is_connected`] and [`Server::open`].
#[derive(EnumSetType, Debug)]
pub enum ConnectFlag {
    /// Fail with `NotConnected` instead of answering `false`.
    Assert,
    /// Connect if not connected.
    Connect,
    /// Create missing resources.
    Create,
}

#[derive(Debug)]
struct ServerState {
    source: DataSource,
    connection: Option<Connection>,
    /// Number of native connections opened over the server's lifetime.
    opened: u64,
}

/// A data source plus its lazily opened native connection.
#[derive(Debug, Clone)]
pub struct Server {
    state: Rc<RefCell<ServerState>>,
}

impl Server {
    /// Create a disconnected server for `connection`.
    pub fn new(connection: &str) -> Result<Self, OntobaseError> {
        Self::open(connection, EnumSet::empty())
    }

    /// Create a server and apply `flags`.
    ///
    /// With `Connect | Create`, the first two path segments of the connection
    /// string name a default database and collection, which are created.
    pub fn open(connection: &str, flags: EnumSet<ConnectFlag>) -> Result<Self, OntobaseError> {
        let server = Self::from_source(DataSource::parse(connection)?);
        if flags.contains(ConnectFlag::Connect) {
            server.connect()?;
            if flags.contains(ConnectFlag::Create) {
                server.materialize_defaults()?;
            }
        }
        Ok(server)
    }

    /// Create a disconnected server for an already parsed data source.
    #[must_use]
    pub fn from_source(source: DataSource) -> Self {
        Self {
            state: Rc::new(RefCell::new(ServerState {
                source,
                connection: None,
                opened: 0,
            })),
        }
    }

    fn materialize_defaults(&self) -> Result<(), OntobaseError> {
        if let Some(database) = self.default_database() {
            if let Some(collection) = self.default_collection_name() {
                database.new_collection(&collection, &crate::Options::default())?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // CONNECTION LIFECYCLE
    // =========================================================================

    /// Open the native connection. No-op if already connected.
    pub fn connect(&self) -> Result<(), OntobaseError> {
        let mut state = self.state.borrow_mut();
        if state.connection.is_some() {
            return Ok(());
        }
        let connection = Connection::open(&state.source)?;
        state.connection = Some(connection);
        state.opened = state.opened.saturating_add(1);
        tracing::info!(source = %state.source, "connected");
        Ok(())
    }

    /// Close the native connection. Returns whether a connection was closed.
    pub fn disconnect(&self) -> bool {
        let mut state = self.state.borrow_mut();
        match state.connection.take() {
            Some(_) => {
                tracing::info!(source = %state.source, "disconnected");
                true
            }
            None => false,
        }
    }

    /// Report the connection state under `flags`.
    ///
    /// - connected: `true`
    /// - `Connect`: connect, then `true`
    /// - `Assert`: `NotConnected`
    /// - otherwise `false`
    pub fn is_connected(&self, flags: EnumSet<ConnectFlag>) -> Result<bool, OntobaseError> {
        if self.state.borrow().connection.is_some() {
            return Ok(true);
        }
        if flags.contains(ConnectFlag::Connect) {
            self.connect()?;
            return Ok(true);
        }
        if flags.contains(ConnectFlag::Assert) {
            return Err(OntobaseError::NotConnected);
        }
        Ok(false)
    }

    /// Number of native connections opened so far.
    #[must_use]
    pub fn connections_opened(&self) -> u64 {
        self.state.borrow().opened
    }

    /// The open connection, without connecting.
    pub(crate) fn connection(&self) -> Result<Connection, OntobaseError> {
        self.state
            .borrow()
            .connection
            .clone()
            .ok_or(OntobaseError::NotConnected)
    }

    /// The connection, opening it if needed.
    pub(crate) fn ensure_connection(&self) -> Result<Connection, OntobaseError> {
        self.is_connected(ConnectFlag::Connect.into())?;
        self.connection()
    }

    // =========================================================================
    // DATA SOURCE
    // =========================================================================

    /// A copy of the connection coordinates.
    #[must_use]
    pub fn source(&self) -> DataSource {
        self.state.borrow().source.clone()
    }

    /// Apply `change` to the data source, refused while connected.
    pub fn modify_source(
        &self,
        field: &'static str,
        change: impl FnOnce(&mut DataSource) -> Result<(), OntobaseError>,
    ) -> Result<(), OntobaseError> {
        let mut state = self.state.borrow_mut();
        if state.connection.is_some() {
            return Err(OntobaseError::LockedWhileConnected(field));
        }
        change(&mut state.source)
    }

    pub fn set_protocol(&self, protocol: &str) -> Result<(), OntobaseError> {
        self.modify_source("protocol", |source| source.set_protocol(protocol))
    }

    pub fn set_host(&self, hosts: &str) -> Result<(), OntobaseError> {
        self.modify_source("host", |source| source.set_host(hosts))
    }

    pub fn set_port(&self, ports: &str) -> Result<(), OntobaseError> {
        self.modify_source("port", |source| source.set_port(ports))
    }

    pub fn set_user(&self, user: &str) -> Result<(), OntobaseError> {
        self.modify_source("user", |source| source.set_user(user))
    }

    /// Remove the user, and with it the password.
    pub fn clear_user(&self) -> Result<(), OntobaseError> {
        self.modify_source("user", |source| {
            source.clear_user();
            Ok(())
        })
    }

    pub fn set_password(&self, password: &str) -> Result<(), OntobaseError> {
        self.modify_source("password", |source| {
            source.set_password(password);
            Ok(())
        })
    }

    pub fn set_path(&self, path: &str) -> Result<(), OntobaseError> {
        self.modify_source("path", |source| {
            source.set_path(path);
            Ok(())
        })
    }

    pub fn set_query_param(&self, name: &str, value: &str) -> Result<(), OntobaseError> {
        self.modify_source("query", |source| {
            source.set_query_param(name, value);
            Ok(())
        })
    }

    pub fn set_fragment(&self, fragment: &str) -> Result<(), OntobaseError> {
        self.modify_source("fragment", |source| {
            source.set_fragment(fragment);
            Ok(())
        })
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    /// Serialize the server, closing its connection.
    ///
    /// The image records whether the server was connected so that [`thaw`]
    /// reopens it.
    ///
    /// [`thaw`]: Server::thaw
    pub fn freeze(&self) -> Result<Vec<u8>, OntobaseError> {
        let was_connected = self.disconnect();
        image_to_bytes(&ServerImage {
            source: self.source(),
            was_connected,
        })
    }

    /// Restore a server from [`freeze`] output, reconnecting if it was open.
    ///
    /// [`freeze`]: Server::freeze
    pub fn thaw(bytes: &[u8]) -> Result<Self, OntobaseError> {
        let image = image_from_bytes(bytes)?;
        let server = Self::from_source(image.source);
        if image.was_connected {
            server.connect()?;
        }
        Ok(server)
    }

    // =========================================================================
    // DATABASES
    // =========================================================================

    /// A handle to the database `name`; nothing is created until used.
    #[must_use]
    pub fn database(&self, name: &str) -> Database {
        Database::new(self.clone(), name)
    }

    /// The database named by the first path segment, if any.
    #[must_use]
    pub fn default_database(&self) -> Option<Database> {
        let name = self
            .state
            .borrow()
            .source
            .path_segments()
            .first()
            .map(|segment| (*segment).to_string());
        name.map(|name| self.database(&name))
    }

    /// The collection name given by the second path segment, if any.
    #[must_use]
    pub fn default_collection_name(&self) -> Option<String> {
        self.state
            .borrow()
            .source
            .path_segments()
            .get(1)
            .map(|segment| (*segment).to_string())
    }

    /// Names of all databases. Connects if needed.
    pub fn list_databases(&self) -> Result<Vec<String>, OntobaseError> {
        self.ensure_connection()?.driver().list_databases()
    }

    /// Drop a database. Connects if needed.
    pub fn drop_database(&self, name: &str) -> Result<bool, OntobaseError> {
        let dropped = self.ensure_connection()?.driver().drop_database(name)?;
        if dropped {
            tracing::info!(database = name, "dropped database");
        }
        Ok(dropped)
    }

    /// Driver traffic counters. Requires an open connection.
    pub fn stats(&self) -> Result<DriverStats, OntobaseError> {
        Ok(self.connection()?.driver().stats())
    }
}

// =============================================================================
// TESTS
// =============================================================================
