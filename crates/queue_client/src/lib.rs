//! # Queue Client
//!
//! Message-queue client module.
//!
//! Responsibilities:
//! - Connect to a broker and open source readers / sink writers
//! - Provide the unified `QueueClient` abstraction over concrete brokers
//! - Support in-memory (fault-injectable) and file-backed brokers

pub mod client;
pub mod file_broker;
pub mod memory_broker;

pub use client::{QueueClient, Result};
pub use contracts::{QueueError, QueueReader, QueueWriter, RawRecord, SourceConfig};
pub use file_broker::{FileBroker, FileReader, FileWriter};
pub use memory_broker::{FaultConfig, MemoryBroker, MemoryReader, MemoryWriter};
