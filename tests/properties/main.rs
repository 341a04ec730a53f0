//! Property tests for rank fusion.
