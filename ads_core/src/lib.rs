//! ADS symbol upload decoder.
//! Responsibilities: walk symbol/datatype upload buffers, resolve types into
//! an offset-bearing tree, decode primitive values.
//! Non-goals: ADS transport and routing (handled by upper layers).

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod application;

pub mod config;
pub mod error;

pub use domain::model;
pub use application::service::SymbolBrowser;
pub use config::AdsConfig;
pub use error::{DecodeError, Diagnostic, RecordError};
pub use ports::{ByteSpanReader, TextCodec, UploadBuffers, UploadSource};
pub use adapters::ads::{DatatypeCatalog, NodeId, SymbolCatalog, SymbolTree};
pub use adapters::EncodingCodec;
