//! Jacques session tracking and coordination engine.
//!
//! The in-process authority behind the Jacques server: it discovers agent
//! processes from the OS, reconciles hook/statusline/scan observations into
//! a canonical session registry, and drives the periodic services (cleanup,
//! process verification, branch divergence, focus watching) plus the tiling
//! coordinator, notification engine, and worktree manager that clients
//! reach over WebSocket.

pub mod cleanup;
pub mod divergence;
pub mod events;
pub mod focus;
pub mod launch;
pub mod mode;
pub mod monitor;
pub mod notify;
pub mod registry;
pub mod scanner;
pub mod terminal;
pub mod tiling;
pub mod window;
pub mod worktree;

pub use events::RegistryEvent;
pub use registry::SessionRegistry;
