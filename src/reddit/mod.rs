// Reddit API integration — authentication, comment listing, moderation
// actions, wiki publication.
//
// Built directly on the Reddit JSON API over reqwest. The `Platform`
// trait in client.rs is the seam the orchestrator talks through, so
// tests can substitute an in-memory platform.

pub mod client;
pub mod rate_limit;
