// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing the core concepts
// of the classifier: a catalogue record, the ignore sentinel
// used for missing labels, and the seams other layers plug into.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// One raw row of the product catalogue
pub mod product;

// Core abstractions (traits) that other layers implement
pub mod traits;

/// Label value marking "no label" for a head.
/// Targets equal to this value are excluded from the loss
/// and from accuracy.
pub const IGNORE_INDEX: i64 = -100;
