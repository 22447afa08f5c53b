//! Scenario-based tests for stageline


mod best_effort;
mod build_push_deploy;
mod cancellation;
mod environment;
mod redeploy;
mod shell;
