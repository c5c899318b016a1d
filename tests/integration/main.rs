//! Integration tests: full refresh cycles against in-memory providers.

mod mock_providers;
mod pipeline;
