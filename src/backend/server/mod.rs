//! Server Module
//!
//! This module contains the code that assembles the Axum HTTP server around
//! the live pipeline.
//!
//! # Architecture
//!
//! - **`state`** - Application state structure and `FromRef` implementations
//! - **`config`** - Store loading
//! - **`init`** - Server initialization and app creation
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports and documentation
//! ├── state.rs        - AppState and FromRef implementations
//! ├── config.rs       - Store loading (MongoDB)
//! └── init.rs         - Server initialization and app creation
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use roadrescue_live::backend::server::create_app;
//! use roadrescue_live::shared::LiveConfig;
//!
//! # async fn example() {
//! let config = LiveConfig::default();
//! let (app, pipeline) = create_app(&config).await;
//! // Serve `app`, then:
//! pipeline.shutdown().await;
//! # }
//! ```

/// Application state management
pub mod state;

/// Store loading
pub mod config;

/// Server initialization
pub mod init;

// Re-export commonly used types
pub use init::create_app;
pub use state::AppState;
