//! Shell worker process protocol.
//!
//! A worker is a long-lived `<shell> <capture script>` process:
//!
//! ```text
//!   request("git ch")          stdin:  git ch\n
//!        │                     stdout: checkout -- Switch branches\n
//!        │                     stdout: cherry-pick -- Apply changes\n
//!        ▼                     stderr: EOF\n
//!   ["checkout -- Switch branches", "cherry-pick -- Apply changes"]
//! ```
//!
//! Submodules:
//! - `codec`: UTF-8 line framing shared by all three pipes.
//! - `spawner`: process launch with environment overrides.
//! - `reader`: stdout collection and stderr sentinel detection.
//! - `lifecycle`: exit monitoring and kill on shutdown.
//! - `state`: the `Uninitialized → Spawning → Running → Terminated` machine.
//! - `client`: [`ShellWorker`], the single-flight request API.

mod client;
pub mod codec;
mod lifecycle;
pub mod reader;
pub mod spawner;
mod state;

pub use client::ShellWorker;
pub use state::{WorkerPhase, TERMINATED_MESSAGE};
