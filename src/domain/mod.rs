// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the trainer
// works with: image/caption pairs, where they come from, and
// where experiment metrics go.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// One (image, caption) training pair
pub mod caption;

// Core abstractions (traits) that other layers implement
pub mod traits;
