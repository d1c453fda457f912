//! Content verification logic

// This module is kept for compatibility but content verification
// is now handled entirely within the parallel verification implementation
// in core/guard.rs which provides better performance through:
// - Batched database cache operations
// - Parallel file processing
// - Efficient cache hit/miss tracking

// All file content verification, hash checking, and cache management
// is now integrated into the parallel verification flow.
