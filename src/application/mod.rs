// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Sequences the other layers for one user goal. No tensor math
// and no printing here; only workflow coordination.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Every hyperparameter and path of a run
pub mod run_config;

// The training workflow
pub mod train_use_case;

// Standalone vocabulary construction
pub mod vocab_use_case;
