//! # Zeta4G Protocol
//!
//! Client-side engine for the Bolt protocol used by
//! [Zeta4G](https://github.com/zeta9044/zeta4g) and compatible graph databases.
//!
//! ## Features
//!
//! - **Version negotiation** - Bolt 3.0 and 4.0 to 4.4, one behavior table per version
//! - **Pipelining** - requests are queued back to back and answered in FIFO order
//! - **Streaming cursors** - bounded `PULL` batches with backpressure, or a single unbounded pull
//! - **Causal bookmarks** - bookmark tokens carried across transactions
//!
//! Connection pooling, routing, authentication and retries are left to the
//! layer above this crate.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use zeta4g_protocol::driver::connection::io::connect;
//! use zeta4g_protocol::{BookmarkHolder, DatabaseName, FetchSize, ProtocolConfig, Query, TransactionConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = tokio::net::TcpStream::connect("localhost:7687").await?;
//! let connection = connect(stream, &ProtocolConfig::default()).await?;
//! let bookmarks = BookmarkHolder::new();
//!
//! let mut cursor = connection
//!     .protocol()
//!     .run_in_auto_commit_transaction(
//!         &connection,
//!         Query::new("MATCH (n:Person) RETURN n.name AS name").with_param("limit", 10i64),
//!         &bookmarks,
//!         &TransactionConfig::default(),
//!         &DatabaseName::named("people"),
//!         FetchSize::new(100)?,
//!     )?
//!     .create()
//!     .await?;
//!
//! while let Some(record) = cursor.next().await? {
//!     println!("{:?}", record.get_str("name"));
//! }
//! cursor.consume().await?;
//! println!("last bookmark: {:?}", bookmarks.get());
//! # Ok(())
//! # }
//! ```
//!
//! ## Explicit Transactions
//!
//! ```rust,no_run
//! # use zeta4g_protocol::{BookmarkSet, Connection, DatabaseName, FetchSize, Query, TransactionConfig};
//! # async fn example(connection: Connection) -> Result<(), Box<dyn std::error::Error>> {
//! let protocol = connection.protocol();
//! let tx = protocol
//!     .begin_transaction(&connection, &BookmarkSet::empty(), &TransactionConfig::default(), &DatabaseName::Default)
//!     .await?;
//!
//! let mut cursor = protocol
//!     .run_in_explicit_transaction(&connection, Query::new("CREATE (n:Node)"), &tx, true, FetchSize::ALL)?
//!     .create()
//!     .await?;
//! cursor.consume().await?;
//!
//! let bookmark = protocol.commit_transaction(&connection, None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`bolt`] - wire layer: PackStream, messages, chunking, handshake
//! - [`driver`] - protocol versions, response handlers, cursors, bookmarks
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bolt;
pub mod driver;

// Re-exports for convenience
pub use driver::{
    BoltProtocol, BookmarkHolder, BookmarkSet, Capabilities, Connection, CursorFactory, DatabaseName,
    DriverError, DriverResult, FetchSize, ProtocolConfig, Query, Record, ResultCursor, ResultSummary,
    TransactionConfig,
};

pub use bolt::{BoltError, BoltVersion, PackStreamValue};
