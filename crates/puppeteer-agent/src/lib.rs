//! Puppeteer Agent - drives agents through reasoning paths
//!
//! The orchestrator fans a task out to several path executors. Each executor
//! asks its selection policy for the next (agent, action) pair, runs it with
//! a bounded timeout and records the outcome in its graphs. Answered paths
//! are combined by an arbitrator. Everything observable is published on the
//! event stream.

pub mod agent;
pub mod arbitrator;
pub mod events;
pub mod executor;
pub mod persona;
pub mod policy;
pub mod registry;
pub mod runner;

pub use agent::{Agent, AgentCatalog, LlmAgent, StepContext};
pub use arbitrator::{Arbitrator, Candidate, LlmArbitrator, MajorityVote};
pub use events::{Event, EventRecord, EventStream, Subscription};
pub use executor::{PathExecutor, PathLimits, PathOutcome};
pub use persona::{default_personas, load_personas, parse_personas, Persona};
pub use policy::{RotatingPolicy, Selection, SelectionPolicy, SelectionState};
pub use registry::ActionRegistry;
pub use runner::{Aggregation, Orchestrator, RunOutcome, RunReport, UnansweredRun};
