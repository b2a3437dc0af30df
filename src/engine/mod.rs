//! Session aggregation core.
//!
//! Architecture:
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ RecordSource │────►│    Driver    │────►│   Reducer    │
//! │  (paged)     │     │  (id → sum)  │     │  (pure fn)   │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │    Export    │
//!                      │  (csv/jsonl) │
//!                      └──────────────┘
//! ```
//!
//! Records are folded strictly in arrival order. Any unknown tag aborts the run.

pub mod driver;
pub mod reducer;
pub mod state;
