// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that describe temporal grounding
// without any tensor or file-format detail:
//
//   caption.rs — a natural-language query anchored to a video
//                interval, and the dataset splits
//   traits.rs  — the seams other layers implement
//                (annotation sources, scalar sinks)
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only structs, enums and traits

// A query sentence with its gold interval
pub mod caption;

// Core abstractions (traits) that other layers implement
pub mod traits;
