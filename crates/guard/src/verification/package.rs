//! Package verification logic

// This module is kept for compatibility but the actual package verification
// is now handled entirely by the parallel verification in core/guard.rs
// which provides better performance through batched database operations.

// Placeholder for any future package-specific verification utilities
// that may be needed alongside the parallel implementation.
